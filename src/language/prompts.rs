use super::Language;

pub(super) static DETECTION_SYSTEM: &str = "You are a language detection expert. \
Respond ONLY with the ISO 639-1 language code of the text (for example 'es' for Spanish \
or 'en' for English). Nothing else.";

pub(super) static FORMAT_SYSTEM: &str = r#"You format transcribed song lyrics.

Organize the text into proper song structure with line breaks, marking verses, choruses
and bridges where they occur.

RULES:
- DO NOT translate. Keep the original language exactly as it is.
- DO NOT change, add or remove words.
- Only reorganize the text into verses."#;

/// System and user prompts for translating lyrics into `language`
pub(super) fn translation(language: Language, text: &str) -> (String, String) {
    if language == Language::Spanish {
        let system = "Eres un traductor experto de canciones al español. Traduce la letra \
conservando el significado, el sentimiento y la naturalidad. NO traduzcas palabra por \
palabra. Adapta las expresiones idiomáticas para que suenen naturales en español, mantén \
el ritmo poético y la estructura de versos, y busca equivalentes para los juegos de \
palabras y referencias culturales."
            .to_string();
        let user = format!(
            "Traduce esta canción al español de forma natural y contextual, organizándola en versos:\n\n{text}"
        );
        return (system, user);
    }

    let name = language.name();
    let system = format!(
        "You are an expert song translator into {name}. Translate the lyrics keeping their \
meaning, sentiment and naturalness in {name}. DO NOT translate literally word by word. \
Adapt idiomatic expressions so they sound natural in {name}, keep the poetic rhythm and \
verse structure, and find {name} equivalents for wordplay and cultural references."
    );
    let user = format!(
        "Translate this song to {name} in a natural and contextual way, organizing it in verses:\n\n{text}"
    );
    (system, user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spanish_prompt_is_written_in_spanish() {
        let (system, user) = translation(Language::Spanish, "hello world");
        assert!(system.starts_with("Eres un traductor"));
        assert!(user.ends_with("hello world"));
    }

    #[test]
    fn test_other_languages_are_named() {
        let (system, user) = translation(Language::Japanese, "hola");
        assert!(system.contains("日本語"));
        assert!(user.starts_with("Translate this song to 日本語"));
    }
}
