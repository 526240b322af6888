mod counts;
mod metadata;
mod tag;

pub use self::counts::Counts;
pub use self::metadata::{Favicon, MetaData};
pub use self::tag::Tags;
