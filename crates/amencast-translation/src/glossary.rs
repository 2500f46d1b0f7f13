//! Fixed glossary of biblical names, places and theological terms.
//!
//! Injected into the system instruction so the model uses canonical
//! renderings instead of free-translating them. Only Spanish, Italian and
//! German are covered; any other target gets neither glossary nor rules.

/// Languages with a glossary column and register rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlossaryLanguage {
    /// Spanish (`es`).
    Spanish,
    /// Italian (`it`).
    Italian,
    /// German (`de`).
    German,
}

impl GlossaryLanguage {
    /// Resolve a language code, case-insensitively.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_lowercase().as_str() {
            "es" => Some(Self::Spanish),
            "it" => Some(Self::Italian),
            "de" => Some(Self::German),
            _ => None,
        }
    }
}

/// One English term and its canonical renderings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlossaryEntry {
    /// English source term.
    pub english: &'static str,
    /// Spanish.
    pub es: &'static str,
    /// Italian.
    pub it: &'static str,
    /// German.
    pub de: &'static str,
}

impl GlossaryEntry {
    /// Rendering for `language`.
    pub fn rendering(&self, language: GlossaryLanguage) -> &'static str {
        match language {
            GlossaryLanguage::Spanish => self.es,
            GlossaryLanguage::Italian => self.it,
            GlossaryLanguage::German => self.de,
        }
    }
}

const fn entry(
    english: &'static str,
    es: &'static str,
    it: &'static str,
    de: &'static str,
) -> GlossaryEntry {
    GlossaryEntry { english, es, it, de }
}

/// The glossary, in prompt order.
pub const GLOSSARY: &[GlossaryEntry] = &[
    // ── Biblical names ──
    entry("Paul", "Pablo", "Paolo", "Paulus"),
    entry("Peter", "Pedro", "Pietro", "Petrus"),
    entry("Mary", "María", "Maria", "Maria"),
    entry("John", "Juan", "Giovanni", "Johannes"),
    entry("James", "Santiago", "Giacomo", "Jakobus"),
    entry("Jesus", "Jesús", "Gesù", "Jesus"),
    entry("Moses", "Moisés", "Mosè", "Mose"),
    entry("Abraham", "Abraham", "Abramo", "Abraham"),
    entry("Isaac", "Isaac", "Isacco", "Isaak"),
    entry("Jacob", "Jacob", "Giacobbe", "Jakob"),
    entry("Joseph", "José", "Giuseppe", "Josef"),
    entry("David", "David", "Davide", "David"),
    entry("Solomon", "Salomón", "Salomone", "Salomo"),
    entry("Noah", "Noé", "Noè", "Noah"),
    // ── Places ──
    entry("Jerusalem", "Jerusalén", "Gerusalemme", "Jerusalem"),
    entry("Bethlehem", "Belén", "Betlemme", "Bethlehem"),
    entry("Nazareth", "Nazaret", "Nazaret", "Nazareth"),
    entry("Galilee", "Galilea", "Galilea", "Galiläa"),
    entry("Jordan", "Jordán", "Giordano", "Jordan"),
    // ── Theological terms ──
    entry("Holy Spirit", "Espíritu Santo", "Spirito Santo", "Heiliger Geist"),
    entry("God", "Dios", "Dio", "Gott"),
    entry("Lord", "Señor", "Signore", "Herr"),
    entry("Christ", "Cristo", "Cristo", "Christus"),
    entry("Messiah", "Mesías", "Messia", "Messias"),
    entry("Savior", "Salvador", "Salvatore", "Erlöser"),
    entry("Sin", "Pecado", "Peccato", "Sünde"),
    entry("Salvation", "Salvación", "Salvezza", "Erlösung"),
    entry("Kingdom of God", "Reino de Dios", "Regno di Dio", "Reich Gottes"),
    entry(
        "Kingdom of Heaven",
        "Reino de los Cielos",
        "Regno dei Cieli",
        "Himmelreich",
    ),
    entry("Grace", "Gracia", "Grazia", "Gnade"),
    entry("Faith", "Fe", "Fede", "Glaube"),
    entry("Hope", "Esperanza", "Speranza", "Hoffnung"),
    entry("Love", "Amor", "Amore", "Liebe"),
    entry("Prayer", "Oración", "Preghiera", "Gebet"),
    entry("Cross", "Cruz", "Croce", "Kreuz"),
    entry("Resurrection", "Resurrección", "Resurrezione", "Auferstehung"),
    entry("Heaven", "Cielo", "Cielo", "Himmel"),
    entry("Hell", "Infierno", "Inferno", "Hölle"),
    entry("Angel", "Ángel", "Angelo", "Engel"),
    entry("Satan", "Satanás", "Satana", "Satan"),
    entry("Devil", "Diablo", "Diavolo", "Teufel"),
    entry("Prophet", "Profeta", "Profeta", "Prophet"),
    entry("Apostle", "Apóstol", "Apostolo", "Apostel"),
    entry("Disciple", "Discípulo", "Discepolo", "Jünger"),
    entry("Church", "Iglesia", "Chiesa", "Kirche"),
    entry("Gospel", "Evangelio", "Vangelo", "Evangelium"),
    entry("Scripture", "Escritura", "Scrittura", "Schrift"),
    entry("Bible", "Biblia", "Bibbia", "Bibel"),
    entry("Testament", "Testamento", "Testamento", "Testament"),
    entry("Covenant", "Pacto", "Patto", "Bund"),
    entry("Baptism", "Bautismo", "Battesimo", "Taufe"),
    entry("Communion", "Comunión", "Comunione", "Abendmahl"),
    entry(
        "Holy Communion",
        "Santa Comunión",
        "Santa Comunione",
        "Heiliges Abendmahl",
    ),
    // ── Common phrases ──
    entry(
        "Praise the Lord",
        "Alabado sea el Señor",
        "Sia lodato il Signore",
        "Gelobt sei der Herr",
    ),
    entry("Thanks be to God", "Gracias a Dios", "Grazie a Dio", "Gott sei Dank"),
    entry(
        "In Jesus' name",
        "En el nombre de Jesús",
        "Nel nome di Gesù",
        "In Jesu Namen",
    ),
    entry("Amen", "Amén", "Amen", "Amen"),
    entry("Hallelujah", "Aleluya", "Alleluia", "Halleluja"),
];

const SPANISH_RULES: &str = "Spanish Translation Rules:
- Use formal \"usted\" for addressing the congregation
- Keep biblical references in Reina-Valera 1960 (RVR-60) style
- Maintain reverent and formal tone
- Use Latin American Spanish (avoid Spain-specific terms)";

const ITALIAN_RULES: &str = "Italian Translation Rules:
- Use formal \"Lei\" for addressing the congregation
- Keep biblical references in Nuova Riveduta or CEI style
- Maintain reverent and elevated language
- Use standard Italian (avoid regional dialects)";

const GERMAN_RULES: &str = "German Translation Rules:
- Use formal \"Sie\" for addressing the congregation
- Keep biblical references in Luther Bible style
- Maintain reverent and formal tone
- Use High German (Hochdeutsch)";

/// Glossary block for the system instruction, or empty when `language` has
/// no glossary column.
pub fn glossary_prompt(language: &str) -> String {
    let Some(lang) = GlossaryLanguage::from_code(language) else {
        return String::new();
    };
    let lines: Vec<String> = GLOSSARY
        .iter()
        .map(|e| format!("- \"{}\" → \"{}\"", e.english, e.rendering(lang)))
        .collect();
    format!(
        "IMPORTANT: Use these exact translations for the following terms:\n{}\n",
        lines.join("\n")
    )
}

/// Register and style rules for `language`, or empty.
pub fn language_instructions(language: &str) -> &'static str {
    match GlossaryLanguage::from_code(language) {
        Some(GlossaryLanguage::Spanish) => SPANISH_RULES,
        Some(GlossaryLanguage::Italian) => ITALIAN_RULES,
        Some(GlossaryLanguage::German) => GERMAN_RULES,
        None => "",
    }
}
