//! Text normalization shared by status parsing and CSV header matching

/// Fold a label into a comparison key.
///
/// Lowercases, strips Spanish diacritics and drops everything that is not
/// alphanumeric, so `"En Proceso"`, `"en_proceso"` and `"EN-PROCESO"` all
/// fold to `"enproceso"` and `"Baños"` folds to `"banos"`.
#[must_use]
pub fn fold_key(input: &str) -> String {
    input
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Trim and collapse inner whitespace runs to single spaces
#[must_use]
pub fn squash_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_case_spacing_and_accents() {
        assert_eq!(fold_key("En Proceso"), "enproceso");
        assert_eq!(fold_key("EN_PROCESO"), "enproceso");
        assert_eq!(fold_key("Baños"), "banos");
        assert_eq!(fold_key("  Dirección "), "direccion");
    }

    #[test]
    fn squashes_whitespace() {
        assert_eq!(squash_whitespace("  Av.   Providencia  123 "), "Av. Providencia 123");
    }
}
