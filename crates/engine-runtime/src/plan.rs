use model::execution::{
    options::SyncOptions,
    step::{Operation, StepKind},
};

/// The job description handed to the step-runner: initialize once, one
/// transfer per table in configuration order, then the cutover.
pub fn operations(options: &SyncOptions) -> Vec<Operation> {
    let transfers = options.tables.iter().map(|t| StepKind::Transfer {
        table: t.name.clone(),
    });

    std::iter::once(StepKind::Initialize)
        .chain(transfers)
        .chain(std::iter::once(StepKind::Cutover))
        .map(|step| Operation::new(step, options.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::execution::options::{ChunkSize, TableSpec};

    #[test]
    fn transfers_follow_configuration_order() {
        let options = SyncOptions {
            source: "src".into(),
            destination: "dst".into(),
            generation: 42,
            tables: vec![
                TableSpec::new("b", ChunkSize::All),
                TableSpec::new("a", ChunkSize::Rows(10)),
            ],
            on_error: Default::default(),
            cutover: Default::default(),
            max_chunk_attempts: 3,
        };

        let steps: Vec<String> = operations(&options)
            .iter()
            .map(|op| op.step.to_string())
            .collect();
        assert_eq!(
            steps,
            vec!["initialize", "transfer(b)", "transfer(a)", "cutover"]
        );
        assert!(operations(&options).iter().all(|op| op.options == options));
    }
}
