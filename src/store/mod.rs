// Change notification and live queries over the document tables
pub mod feed;
pub mod live;

pub use feed::{Change, ChangeFeed};
pub use live::LiveQuery;
