pub mod collection;
pub mod content;
pub mod models;
pub mod repository;

pub use collection::{Collection, ScreenState};
pub use content::{ContentResolver, PageView};
pub use models::{CrmLead, HeroText, LeadStatus, Page, Product, Setting, COLLECTIONS};
pub use repository::{HttpRepository, Repository, Resource};
