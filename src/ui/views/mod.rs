mod record_view;
mod table_view;

pub use record_view::RecordView;
pub use table_view::TableView;
