pub mod avl;
pub mod category;
pub mod order;

pub use avl::AvlTree;
pub use category::CategoryIndex;
pub use order::{ById, ByStartDate, RecordOrder};
