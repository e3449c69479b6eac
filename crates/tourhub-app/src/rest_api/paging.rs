use serde::Serialize;
use tourhub_dal::Batch;

/// One page of listing as returned to clients
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub total: u64,
    pub rows: Vec<T>,
}

impl<T> Page<T>
where
    T: Serialize,
{
    pub fn from_batch(batch: Batch<T>) -> Self {
        let page_size = batch.limit.max(1);
        let total = batch.total;
        Self {
            page: batch.offset / page_size + 1,
            page_size,
            total_pages: total.div_ceil(page_size as u64) as i64,
            total,
            rows: batch.rows,
        }
    }
}
