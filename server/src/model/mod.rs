pub mod app_status;
