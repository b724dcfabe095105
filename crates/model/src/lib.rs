pub mod core {
    pub mod identifiers;
    pub mod value;
}

pub mod execution {
    pub mod options;
    pub mod state;
    pub mod step;
}

pub mod records {
    pub mod row;
}
