pub mod prelude {
    pub use entity::app_status;
    pub use entity::prelude::*;
    pub use sea_orm::entity::prelude::*;
    pub use sea_orm::{
        sea_query::OnConflict, ActiveValue::Set, ConnectionTrait, DatabaseBackend,
        DatabaseConnection, DbErr, Statement,
    };
}
