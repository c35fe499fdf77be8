//! Domain models with validation at construction
//!
//! All user input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod validation;
pub mod text;
pub mod email;
pub mod password;
pub mod amount;
pub mod kinds;
pub mod pagination;

pub use validation::{FieldError, Validate, ValidationError, ValidationErrors};
pub use email::Email;
pub use password::Password;
pub use amount::Amount;
pub use kinds::{ConnectStatus, MediaKind, NotificationKind, OfferStatus, TeamRole, UserRole};
pub use pagination::{like_pattern, ListParams, Paginated, Pagination, PaginationParams};
