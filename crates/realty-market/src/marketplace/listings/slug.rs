//! URL slugs for listings.

/// Lowercase the title and keep ASCII letters, digits, Arabic script, spaces
/// and hyphens; whitespace runs become single hyphens.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for ch in title.to_lowercase().chars() {
        let keep = ch.is_ascii_lowercase() || ch.is_ascii_digit() || is_arabic(ch);
        if keep {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch);
        } else if ch.is_whitespace() || ch == '-' {
            pending_hyphen = true;
        }
    }

    slug
}

fn is_arabic(ch: char) -> bool {
    ('\u{0600}'..='\u{06FF}').contains(&ch)
}

/// `slugify(title)` plus a random 8 hex character suffix. Collisions are
/// not checked.
pub fn generate_slug(title: &str) -> String {
    let suffix = hex::encode(rand::random::<[u8; 4]>());
    let base = slugify(title);
    if base.is_empty() {
        suffix
    } else {
        format!("{base}-{suffix}")
    }
}
