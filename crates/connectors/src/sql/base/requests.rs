/// A window of rows read from one table in a stable order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRowsRequest {
    pub table: String,
    pub order_by: Vec<String>,
    pub offset: u64,
    /// `None` reads everything from `offset` on.
    pub limit: Option<u64>,
}

pub struct FetchRowsRequestBuilder {
    table: String,
    order_by: Vec<String>,
    offset: u64,
    limit: Option<u64>,
}

impl FetchRowsRequestBuilder {
    pub fn new(table: String) -> Self {
        FetchRowsRequestBuilder {
            table,
            order_by: Vec::new(),
            offset: 0,
            limit: None,
        }
    }

    pub fn order_by(mut self, columns: Vec<String>) -> Self {
        self.order_by = columns;
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn build(self) -> FetchRowsRequest {
        FetchRowsRequest {
            table: self.table,
            order_by: self.order_by,
            offset: self.offset,
            limit: self.limit,
        }
    }
}
