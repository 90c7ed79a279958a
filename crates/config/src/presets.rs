//! Industry presets: ordered pattern tables and urgency tables as data.
//!
//! Patterns are matched against trimmed, lowercased text. Order matters in
//! `complete`, `fragments` and `intents`: the first match wins.

use crate::{EntityPatterns, IntentPatterns, PatternConfig, SemanticConfig};
use chatbuffer_core::UrgencyClass;
use std::collections::BTreeMap;

/// Industries with a built-in preset.
pub const INDUSTRIES: &[&str] = &["medical", "ecommerce", "generic"];

/// Build the semantic configuration for an industry.
pub fn semantic(industry: &str) -> Option<SemanticConfig> {
    match industry {
        "medical" => Some(medical()),
        "ecommerce" => Some(ecommerce()),
        "generic" => Some(generic()),
        _ => None,
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn intent(name: &str, patterns: &[&str]) -> IntentPatterns {
    IntentPatterns {
        name: name.into(),
        patterns: strings(patterns),
    }
}

fn entity(kind: &str, patterns: &[&str]) -> EntityPatterns {
    EntityPatterns {
        kind: kind.into(),
        patterns: strings(patterns),
    }
}

fn urgency_table(entries: &[(&str, UrgencyClass)]) -> BTreeMap<String, UrgencyClass> {
    entries
        .iter()
        .map(|(intent, class)| (intent.to_string(), *class))
        .collect()
}

// Shared Spanish building blocks.

const QUESTION: &str = r"\?[\s!]*$";
const LONG_SENTENCE: &str = r"^\S+(\s+\S+){3,}[.!]$";
const DAY_REFERENCE: &str = r"(para|el|este|esta|próximo|proximo)\s+(hoy|pasado mañana|mañana|lunes|martes|miércoles|miercoles|jueves|viernes|sábado|sabado|domingo|fin de semana)";
const SHORT_REPLY: &str = r"^(sí|si|no|ok|okay|dale|perfecto|listo|de acuerdo|genial|gracias|muchas gracias)[\s.!]*$";
const GREETING_SHORTCUT: &str = r"^(hola|buenas|buenos días|buenos dias|buenas tardes|buenas noches|buen día|buen dia)[\s,!.]*((dr|dra|doctor|doctora|sr|sra|srta|señor|señora|señorita|lic|licenciado|licenciada|gente|chicos|equipo|todos|a todos)[\s,!.]*)?$";
// A greeting followed by a want/need verb is the start of a request.
const GREETING_PREFIX: &str = r"^((hola|buenas|buenos días|buenos dias|buenas tardes|buenas noches|buen día|buen dia)[\s,!.]+)?";
const FAREWELL_SHORTCUT: &str = r"^(chau|chao|adiós|adios|hasta luego|hasta mañana|nos vemos)\b";

const TRAILING_CONNECTOR: &str = r"\b(y|o|pero|que|para|con|de|del|en|a|al|un|una|el|la|los|las|mi|mis|por|sobre|como)$";
const TRAILING_PAUSE: &str = r"(,|\.\.\.|…|-)$";
const LEADING_CONNECTOR: &str = r"^(y|pero|entonces|además|ademas|también|tambien)\b";
const SINGLE_WORD: &str = r"^\S+$";

const GREETING: &str = r"^(hola|buenas|buenos días|buenos dias|buen día|buen dia)";
const FAREWELL: &str = r"(chau|chao|adiós|adios|hasta luego|nos vemos)";
const CONFIRMATION: &str = r"^(sí|si|ok|okay|dale|perfecto|listo|confirmo|de acuerdo)([\s.!,]|$)";
const NEGATION: &str = r"^(no|nop|nunca|para nada)([\s.!,]|$)";

const DATE_WORDS: &str = r"\b(hoy|pasado mañana|mañana|lunes|martes|miércoles|miercoles|jueves|viernes|sábado|sabado|domingo)";
const DATE_NUMERIC: &str = r"\b\d{1,2}/\d{1,2}(/\d{2,4})?";
const DATE_SPELLED: &str = r"\b\d{1,2} de (enero|febrero|marzo|abril|mayo|junio|julio|agosto|septiembre|octubre|noviembre|diciembre)";
const PHONE: &str = r"\+?\d[\d\s-]{7,}\d";

fn medical() -> SemanticConfig {
    SemanticConfig {
        patterns: PatternConfig {
            complete: strings(&[
                QUESTION,
                LONG_SENTENCE,
                DAY_REFERENCE,
                r"(a las|tipo|después de las|despues de las|antes de las)\s+\d{1,2}(:\d{2})?",
                SHORT_REPLY,
                GREETING_SHORTCUT,
                FAREWELL_SHORTCUT,
            ]),
            fragments: strings(&[
                &format!(r"{GREETING_PREFIX}(quiero|quisiera|queria|quería|necesito|necesitaría|necesitaria|me gustaría|me gustaria|tengo|busco)\b"),
                TRAILING_CONNECTOR,
                TRAILING_PAUSE,
                LEADING_CONNECTOR,
                SINGLE_WORD,
            ]),
            intents: vec![
                intent(
                    "appointment",
                    &[
                        r"(sacar|pedir|quiero|quisiera|necesito|necesitaría|necesitaria|solicitar|dar)\s+(un\s+|una\s+)?(turno|cita|consulta|hora)",
                        r"(agendar|reservar|turno para|cita para|consulta para)",
                    ],
                ),
                intent(
                    "cancellation",
                    &[r"(cancelar|cancelo|anular|anulo|no (voy a|puedo) (ir|asistir))"],
                ),
                intent(
                    "modification",
                    &[r"(cambiar|mover|reprogramar|modificar|pasar el turno|otro día|otro dia|otro horario)"],
                ),
                intent(
                    "information",
                    &[r"(horario|dirección|direccion|dónde|donde|precio|costo|cuánto|cuanto|obra social|prepaga|información|informacion)"],
                ),
                intent(
                    "medical_query",
                    &[r"(dolor|duele|síntoma|sintoma|fiebre|receta|medicamento|análisis|analisis|resultado|estudio)"],
                ),
                intent("greeting", &[GREETING]),
                intent("farewell", &[FAREWELL]),
                intent("confirmation", &[CONFIRMATION]),
                intent("negation", &[NEGATION]),
            ],
            entities: vec![
                entity("date", &[DATE_WORDS, DATE_NUMERIC, DATE_SPELLED]),
                entity(
                    "time",
                    &[
                        r"\b\d{1,2}(:\d{2})?\s*(hs|h|am|pm)\b",
                        r"(a las|tipo|después de las|despues de las|antes de las)\s+\d{1,2}(:\d{2})?",
                        r"(en la mañana|a la mañana|por la mañana|a la tarde|por la tarde|en la tarde|a la noche|por la noche|mediodía|mediodia)",
                    ],
                ),
                entity(
                    "doctor",
                    &[r"\b(dr|dra|doctor|doctora)\.?\s+(?P<value>[a-záéíóúñü]{3,})"],
                ),
                entity(
                    "specialty",
                    &[r"(cardiolog[ií]a|pediatr[ií]a|dermatolog[ií]a|traumatolog[ií]a|ginecolog[ií]a|oftalmolog[ií]a|odontolog[ií]a|kinesiolog[ií]a|cl[ií]nica m[ée]dica)"],
                ),
                entity("phone", &[PHONE]),
            ],
        },
        urgency: urgency_table(&[
            ("appointment", UrgencyClass::Urgent),
            ("cancellation", UrgencyClass::Urgent),
            ("modification", UrgencyClass::Urgent),
            ("information", UrgencyClass::Simple),
            ("greeting", UrgencyClass::Simple),
            ("farewell", UrgencyClass::Simple),
            ("confirmation", UrgencyClass::Simple),
            ("negation", UrgencyClass::Simple),
            ("medical_query", UrgencyClass::Complex),
            ("unknown", UrgencyClass::Complex),
        ]),
    }
}

fn ecommerce() -> SemanticConfig {
    SemanticConfig {
        patterns: PatternConfig {
            complete: strings(&[
                QUESTION,
                LONG_SENTENCE,
                r"(pedido|orden|compra)\s+#?\d{4,}",
                SHORT_REPLY,
                GREETING_SHORTCUT,
                FAREWELL_SHORTCUT,
            ]),
            fragments: strings(&[
                &format!(r"{GREETING_PREFIX}(quiero|quisiera|queria|quería|necesito|me gustaría|me gustaria|busco|tienen)\b"),
                TRAILING_CONNECTOR,
                TRAILING_PAUSE,
                LEADING_CONNECTOR,
                SINGLE_WORD,
            ]),
            intents: vec![
                intent(
                    "order",
                    &[r"(comprar|hacer un pedido|quiero (pedir|comprar|encargar)|agregar al carrito)"],
                ),
                intent("return", &[r"(devolver|devolución|devolucion|reembolso|cambio de talle)"]),
                intent(
                    "tracking",
                    &[r"(dónde está mi|donde esta mi|seguimiento|envío|envio|no llegó|no llego|cuándo llega|cuando llega)"],
                ),
                intent("payment", &[r"(pagar|pago|tarjeta|transferencia|cuotas|factura)"]),
                intent(
                    "information",
                    &[r"(precio|stock|talle|talles|colores|horario|cuánto|cuanto|envían|envian)"],
                ),
                intent("greeting", &[GREETING]),
                intent("farewell", &[FAREWELL]),
                intent("confirmation", &[CONFIRMATION]),
                intent("negation", &[NEGATION]),
            ],
            entities: vec![
                entity("order_id", &[r"(pedido|orden|compra)\s+#?(?P<value>\d{4,})"]),
                entity("amount", &[r"\$\s?\d+([.,]\d+)?"]),
                entity("size", &[r"talle\s+(?P<value>[a-z0-9]{1,3})\b"]),
                entity("date", &[DATE_WORDS, DATE_NUMERIC]),
                entity("phone", &[PHONE]),
            ],
        },
        urgency: urgency_table(&[
            ("order", UrgencyClass::Urgent),
            ("return", UrgencyClass::Urgent),
            ("payment", UrgencyClass::Urgent),
            ("tracking", UrgencyClass::Simple),
            ("information", UrgencyClass::Simple),
            ("greeting", UrgencyClass::Simple),
            ("farewell", UrgencyClass::Simple),
            ("confirmation", UrgencyClass::Simple),
            ("negation", UrgencyClass::Simple),
            ("unknown", UrgencyClass::Complex),
        ]),
    }
}

fn generic() -> SemanticConfig {
    SemanticConfig {
        patterns: PatternConfig {
            complete: strings(&[
                QUESTION,
                r"[.!]$",
                r"^(yes|no|ok|okay|thanks|thank you|sí|si|dale|gracias)[\s.!]*$",
                r"^(hi|hello|hey|hola|buenas)[\s,!.]*(\S+)?[\s.!]*$",
                r"^(bye|goodbye|see you|chau|adiós|adios)\b",
            ]),
            fragments: strings(&[
                r"\b(and|or|but|to|with|for|of|the|a|an|my|y|o|pero|que|para|con|de|en|un|una|el|la)$",
                TRAILING_PAUSE,
                SINGLE_WORD,
            ]),
            intents: vec![
                intent("information", &[r"(what|when|where|how much|price|hours|qué|que|cuándo|cuando|dónde|donde|cuánto|cuanto)"]),
                intent("greeting", &[r"^(hi|hello|hey|hola|buenas)"]),
                intent("farewell", &[r"(bye|goodbye|see you|chau|adiós|adios)"]),
                intent("confirmation", &[r"^(yes|ok|okay|sure|sí|si|dale)([\s.!,]|$)"]),
                intent("negation", &[r"^(no|nope|never|nunca)([\s.!,]|$)"]),
            ],
            entities: vec![
                entity("date", &[r"\b(today|tomorrow|hoy|mañana)", DATE_NUMERIC]),
                entity("email", &[r"[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}"]),
                entity("phone", &[PHONE]),
            ],
        },
        urgency: urgency_table(&[
            ("information", UrgencyClass::Simple),
            ("greeting", UrgencyClass::Simple),
            ("farewell", UrgencyClass::Simple),
            ("confirmation", UrgencyClass::Simple),
            ("negation", UrgencyClass::Simple),
            ("unknown", UrgencyClass::Complex),
        ]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_industry_has_a_preset() {
        for industry in INDUSTRIES {
            let preset = semantic(industry).unwrap();
            assert!(!preset.patterns.complete.is_empty(), "{industry}");
            assert!(!preset.patterns.intents.is_empty(), "{industry}");
            assert!(preset.urgency.contains_key("unknown"), "{industry}");
        }
    }

    #[test]
    fn medical_intent_priority_order() {
        let preset = semantic("medical").unwrap();
        let names: Vec<&str> = preset
            .patterns
            .intents
            .iter()
            .map(|i| i.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "appointment",
                "cancellation",
                "modification",
                "information",
                "medical_query",
                "greeting",
                "farewell",
                "confirmation",
                "negation",
            ]
        );
    }

    #[test]
    fn unknown_industry_has_no_preset() {
        assert!(semantic("aerospace").is_none());
    }
}
