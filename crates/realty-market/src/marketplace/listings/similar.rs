use super::domain::Listing;

/// Number of suggestions returned for a listing.
pub const SIMILAR_LIMIT: usize = 4;

/// One point each for same city, same type, price within ±20% of the
/// source (inclusive), equal area, and equal bedroom count.
pub fn similarity_score(source: &Listing, candidate: &Listing) -> u8 {
    let mut score = 0;
    if candidate.location.city == source.location.city {
        score += 1;
    }
    if candidate.property_type == source.property_type {
        score += 1;
    }
    if candidate.price >= source.price * 0.8 && candidate.price <= source.price * 1.2 {
        score += 1;
    }
    if (candidate.area - source.area).abs() < f64::EPSILON {
        score += 1;
    }
    if candidate.bedrooms == source.bedrooms {
        score += 1;
    }
    score
}

/// Highest scores first; ties keep candidate order; zero scores dropped.
pub fn rank_similar(source: &Listing, candidates: Vec<Listing>) -> Vec<Listing> {
    let mut scored: Vec<(u8, Listing)> = candidates
        .into_iter()
        .filter(|candidate| candidate.id != source.id)
        .map(|candidate| (similarity_score(source, &candidate), candidate))
        .filter(|(score, _)| *score > 0)
        .collect();
    scored.sort_by(|left, right| right.0.cmp(&left.0));
    scored
        .into_iter()
        .take(SIMILAR_LIMIT)
        .map(|(_, listing)| listing)
        .collect()
}
