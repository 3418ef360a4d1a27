use domainwatch_core::{evaluate, Category, Provider, SignalContext};

use crate::catalog::CatalogDef;

/// Rebuild a signal context from a discovered provider's stored name/domain,
/// populating the field the catalog category is detected from.
///
/// Returns `None` for hosting: its detection source (HTTP response headers)
/// cannot be reconstructed from a name/domain pair, so hosting providers are
/// never retrospectively matched.
pub fn retro_context(category: Category, discovered: &Provider) -> Option<SignalContext> {
    let mut ctx = SignalContext::default();

    let host_list = || {
        let mut entries = vec![discovered.name.clone()];
        if let Some(ref domain) = discovered.domain {
            entries.push(domain.clone());
        }
        entries
    };

    match category {
        Category::Email => ctx.mail_exchangers = host_list(),
        Category::Dns => ctx.nameservers = host_list(),
        Category::Ca => ctx.issuer = Some(discovered.name.to_lowercase()),
        Category::Registrar => ctx.registrar = Some(discovered.name.to_lowercase()),
        Category::Hosting => return None,
    }

    Some(ctx)
}

/// Would this catalog definition's rule have classified the discovered
/// provider? Evaluation failures are demoted to non-matches: one bad rule
/// must never abort a reconciliation pass.
pub fn matches_catalog(def: &CatalogDef, discovered: &Provider) -> bool {
    let Some(ref rule) = def.rule else {
        return false;
    };

    let Some(ctx) = retro_context(def.category, discovered) else {
        return false;
    };

    match evaluate(rule, &ctx) {
        Ok(matched) => matched,
        Err(e) => {
            log::warn!(
                "rule for catalog provider '{}' failed against '{}': {e}; treating as non-match",
                def.name,
                discovered.name
            );
            false
        }
    }
}
