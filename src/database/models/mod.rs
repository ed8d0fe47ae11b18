pub mod audio;
pub mod book;
pub mod note;
pub mod tenant;
pub mod user;

pub use audio::{AudioTimestamp, ChapterAudio, Reciter};
pub use book::{Book, Chapter, Verse};
pub use note::{Bookmark, PlayHistory, UserNote};
pub use tenant::Tenant;
pub use user::User;
