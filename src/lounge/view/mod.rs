//! 视图状态
//!
//! 每个视图模型自己持有状态并重新拉取数据，写操作完成后才更新本地状态。

pub mod book_card;
pub mod filter;
pub mod pagination;
pub mod review_list;
pub mod scope;

// 重新导出主要类型和函数
pub use book_card::BookCardState;
pub use filter::{BookFilter, SortBy, ALL_GENRES};
pub use pagination::{Paginator, DEFAULT_PER_PAGE};
pub use review_list::{ReviewListMode, ReviewListView, DEFAULT_TOP_REVIEWS};
pub use scope::ViewScope;
