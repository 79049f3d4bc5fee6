pub mod collection;
pub mod diagram;
pub mod ids;
pub mod page;
pub mod user;

pub use collection::CollectionInfo;
pub use diagram::{Diagram, DiagramPatch, NewDiagram};
pub use ids::{DiagramId, UserId};
pub use page::ListResult;
pub use user::User;
