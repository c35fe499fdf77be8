//! Repository implementations for database access
//!
//! Each repository follows these patterns:
//! - Single-table reads go through [`BaseRepo`]
//! - Uniqueness is enforced by constraints (no check-then-insert)
//! - Multi-row changes, counters included, run in one transaction
//! - Ownership is checked in SQL or under a row lock, never after the write

pub mod base;
pub mod users;
pub mod sectors;
pub mod projects;
pub mod offers;
pub mod connects;
pub mod teams;
pub mod posts;
pub mod comments;
pub mod likes;
pub mod discussions;
pub mod messages;
pub mod notifications;
pub mod media;
pub mod blacklist;

pub use base::{page_from_rows, BaseRepo, DbError, Filter, Table};
pub use users::{NewUser, ProfileUpdate, RemovedFiles, User, UserRepo};
pub use sectors::{NewSector, Sector, SectorRepo, SectorUpdate, SectorWithCount};
pub use projects::{NewProject, Project, ProjectFilter, ProjectRepo, ProjectUpdate};
pub use offers::{NewOffer, Offer, OfferRepo, OfferUpdate};
pub use connects::{Connect, ConnectRepo};
pub use teams::{TeamMember, TeamRepo};
pub use posts::{Post, PostRepo, PostWithCounts};
pub use comments::{Comment, CommentRepo};
pub use likes::{Like, LikeRepo};
pub use discussions::{Discussion, DiscussionRepo};
pub use messages::{Message, MessageRepo};
pub use notifications::{notify, NewNotification, Notification, NotificationRepo};
pub use media::{MediaRepo, PostMedia, ProjectFile};
pub use blacklist::BlacklistRepo;

/// Fixtures for the database-backed tests
///
/// Run with: DATABASE_URL=... cargo test -p pitchhub-server -- --ignored
#[cfg(test)]
pub(crate) mod test_support {
    use sqlx::PgPool;
    use uuid::Uuid;

    use super::*;
    use crate::models::{Amount, Email, UserRole};

    pub async fn pool() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = crate::db::create_pool(&url).await.expect("pool creation failed");
        crate::db::migrations::run(&pool).await.expect("migrations failed");
        pool
    }

    pub async fn user(pool: &PgPool) -> User {
        let email = format!("user-{}@example.com", Uuid::new_v4().simple());
        UserRepo::new(pool)
            .create(NewUser {
                email: Email::new(&email).unwrap(),
                password_hash: "not-a-real-hash".into(),
                first_name: "Test".into(),
                last_name: "User".into(),
                bio: None,
                role: UserRole::Entrepreneur,
            })
            .await
            .unwrap()
    }

    pub async fn sector(pool: &PgPool) -> Sector {
        SectorRepo::new(pool)
            .create(NewSector {
                name: format!("Sector {}", Uuid::new_v4().simple()),
                description: None,
            })
            .await
            .unwrap()
    }

    pub async fn project(pool: &PgPool, owner_id: Uuid) -> Project {
        let sector = sector(pool).await;
        ProjectRepo::new(pool)
            .create(
                owner_id,
                NewProject {
                    sector_id: sector.id,
                    title: "Community solar".into(),
                    description: "Shared rooftop arrays for apartment blocks".into(),
                    funding_goal: Amount::new("funding_goal", 1_000_000).unwrap(),
                },
            )
            .await
            .unwrap()
    }

    pub async fn offer(pool: &PgPool, investor_id: Uuid, project_id: Uuid) -> Offer {
        OfferRepo::new(pool)
            .create(
                investor_id,
                NewOffer {
                    project_id,
                    amount: Amount::new("amount", 25_000).unwrap(),
                    message: None,
                },
            )
            .await
            .unwrap()
    }
}
