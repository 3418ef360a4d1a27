/// Normalize a display name into a URL-safe slug.
///
/// Lowercases, folds every run of non-alphanumeric characters into a single
/// `-`, and trims leading/trailing dashes. `"Tuta GmbH"` → `"tuta-gmbh"`,
/// `"mail.tutanota.de"` → `"mail-tutanota-de"`.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            for lc in c.to_lowercase() {
                out.push(lc);
            }
        } else {
            pending_dash = true;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic() {
        assert_eq!(slugify("Cloudflare"), "cloudflare");
        assert_eq!(slugify("Tuta GmbH"), "tuta-gmbh");
    }

    #[test]
    fn dots_and_punctuation_fold() {
        assert_eq!(slugify("mail.tutanota.de"), "mail-tutanota-de");
        assert_eq!(slugify("Gandi, SAS."), "gandi-sas");
        assert_eq!(slugify("  OVH -- Cloud  "), "ovh-cloud");
    }

    #[test]
    fn unicode_lowercases() {
        assert_eq!(slugify("Überspace"), "überspace");
    }

    #[test]
    fn empty_and_symbol_only() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("---"), "");
    }
}
