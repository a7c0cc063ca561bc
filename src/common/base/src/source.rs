//! Access interfaces consumed by the algorithm layer and evaluation tooling.

use std::collections::BTreeSet;

use crate::order::SortOrder;
use crate::rating::Rating;

/// RatingSource streams every rating it holds.
pub trait RatingSource {
    /// stream_ratings returns all ratings in the requested order.
    fn stream_ratings(&self, order: SortOrder) -> Box<dyn Iterator<Item = Rating> + Send + '_>;
}

/// UserRatingSource answers per-user queries.
pub trait UserRatingSource {
    /// users returns the known user ids in ascending order.
    fn users(&self) -> Vec<u64>;

    /// ratings_for_user returns the user's ratings, or `None` if the user is unknown.
    fn ratings_for_user(&self, user: u64) -> Option<Vec<Rating>>;
}

/// ItemRatingSource answers per-item queries.
pub trait ItemRatingSource {
    /// items returns the known item ids in ascending order.
    fn items(&self) -> Vec<u64>;

    /// ratings_for_item returns the item's ratings, or `None` if the item is unknown.
    fn ratings_for_item(&self, item: u64) -> Option<Vec<Rating>>;

    /// users_for_item returns the users who rated the item, or `None` if the item is unknown.
    fn users_for_item(&self, item: u64) -> Option<BTreeSet<u64>> {
        self.ratings_for_item(item)
            .map(|ratings| ratings.iter().map(|r| r.user).collect())
    }
}
