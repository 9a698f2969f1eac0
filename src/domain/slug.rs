/// Lower-case, ASCII, hyphen-separated slug of `value`.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else if ch.is_whitespace() || ch == '-' {
            pending_dash = true;
        }
    }
    slug.trim_matches(|c| c == '-' || c == '_').to_string()
}

/// `base`, `base-1`, `base-2`, ... for uniqueness probing.
pub fn candidates(base: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(base.to_string()).chain((1..).map(move |n| format!("{base}-{n}")))
}

/// `<product sku>-<volume>-<first three letters of gender>`.
pub fn variant_sku_base(product_sku: &str, volume_ml: i32, gender: &str) -> String {
    let code: String = gender.chars().take(3).collect::<String>().to_uppercase();
    format!("{product_sku}-{volume_ml}-{code}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_punctuation_and_spaces() {
        assert_eq!(slugify("Oud  Royale -- Intense!"), "oud-royale-intense");
        assert_eq!(slugify("  Rose & Musk  "), "rose-musk");
        assert_eq!(slugify("Eau de Café"), "eau-de-caf");
    }

    #[test]
    fn candidates_append_counter() {
        let first: Vec<String> = candidates("oud").take(3).collect();
        assert_eq!(first, vec!["oud", "oud-1", "oud-2"]);
    }

    #[test]
    fn variant_sku_uses_gender_prefix() {
        assert_eq!(variant_sku_base("SJ-OUD", 100, "Unisex"), "SJ-OUD-100-UNI");
        assert_eq!(variant_sku_base("SJ-OUD", 50, "Female"), "SJ-OUD-50-FEM");
    }
}
