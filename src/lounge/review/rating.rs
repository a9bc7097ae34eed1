//! 评分汇总（客户端聚合）

use crate::lounge::review::models::Review;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RatingSummary {
    pub average: f64,
    pub count: usize,
}

impl RatingSummary {
    pub fn from_ratings<I: IntoIterator<Item = u8>>(ratings: I) -> Self {
        let (total, count) = ratings
            .into_iter()
            .fold((0u64, 0usize), |(t, c), r| (t + u64::from(r), c + 1));
        if count == 0 {
            return Self::default();
        }
        Self {
            average: total as f64 / count as f64,
            count,
        }
    }

    /// 星级展示用的整数评分
    pub fn rounded_stars(&self) -> u8 {
        self.average.round().clamp(0.0, 5.0) as u8
    }

    pub fn label(&self) -> String {
        match self.count {
            0 => "No ratings yet".to_string(),
            1 => format!("{:.1} stars (1 review)", self.average),
            n => format!("{:.1} stars ({} reviews)", self.average, n),
        }
    }
}

/// 按书籍 ID 汇总评分
pub fn ratings_by_book(reviews: &[Review]) -> HashMap<String, RatingSummary> {
    let mut grouped: HashMap<String, Vec<u8>> = HashMap::new();
    for review in reviews {
        if review.book.book_id.is_empty() {
            continue;
        }
        grouped
            .entry(review.book.book_id.clone())
            .or_default()
            .push(review.rating);
    }
    grouped
        .into_iter()
        .map(|(book_id, ratings)| (book_id, RatingSummary::from_ratings(ratings)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lounge::book::BookSnapshot;

    fn review(book_id: &str, rating: u8) -> Review {
        Review {
            id: format!("{book_id}-{rating}"),
            book: BookSnapshot {
                book_id: book_id.into(),
                ..Default::default()
            },
            user: None,
            rating,
            review_text: "ok".into(),
            likes: 0,
            created_at: None,
        }
    }

    #[test]
    fn summary_label() {
        assert_eq!(RatingSummary::default().label(), "No ratings yet");
        let one = RatingSummary::from_ratings([4]);
        assert_eq!(one.label(), "4.0 stars (1 review)");
        let many = RatingSummary::from_ratings([4, 5]);
        assert_eq!(many.label(), "4.5 stars (2 reviews)");
        assert_eq!(many.rounded_stars(), 5);
    }

    #[test]
    fn groups_by_book() {
        let summaries = ratings_by_book(&[review("a", 2), review("a", 4), review("b", 5), review("", 1)]);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries["a"].average, 3.0);
        assert_eq!(summaries["b"].count, 1);
    }
}
