/// Business logic layer
///
/// - `posts`: post CRUD, nested comment payloads, paginated listing
/// - `comments`: comment threading, cascade deletes, paginated listing
/// - `counter`: the comments_count reconciler, shared by both
pub mod comments;
pub mod counter;
pub mod posts;

pub use comments::CommentService;
pub use posts::PostService;
