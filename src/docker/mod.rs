pub mod compose;
mod login;
mod tags;

pub use login::login;
pub use tags::{prefixed_tag, push_tags, retag_image, split_image};
