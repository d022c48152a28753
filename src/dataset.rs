//! Statistics datasets: the long PLV table joined with the participant sheet
//! and the behavioural logs, plus the AEP and N400 tables joined with the
//! participant sheet.
//!
//! The PLV dataset gets two derived columns: `condition` from the stimulus
//! id prefix and `cluster` from the channel.  Rows whose channel is in no
//! cluster are dropped.
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::info;

use crate::config::DatasetConfig;
use crate::error::Result;
use crate::io::read_table;
use crate::table::Table;

/// `context` for ids starting with `context_prefix`, `random` otherwise.
pub fn condition_label(stimulus_id: &str, context_prefix: &str) -> &'static str {
    if stimulus_id.starts_with(context_prefix) {
        "context"
    } else {
        "random"
    }
}

/// Cluster holding `channel`, if any.
pub fn cluster_of<'a>(channel: &str, cfg: &'a DatasetConfig) -> Option<&'a str> {
    cfg.eeg_clusters
        .iter()
        .find(|(_, channels)| channels.iter().any(|c| c == channel))
        .map(|(name, _)| name.as_str())
}

/// Stack the behavioural logs, tagging each row with its participant and
/// naming the columns the PLV table uses (`file` → `stimulus_id`,
/// `hit` → `correct`).
pub fn stack_logs(logs: &[(String, Table)]) -> Result<Table> {
    let tagged: Vec<Table> = logs
        .iter()
        .map(|(participant, log)| {
            let mut log = log.clone();
            log.rename("file", "stimulus_id");
            log.rename("hit", "correct");
            log.add_column("participant_id", |_| participant.clone());
            log
        })
        .collect();
    Table::concat(&tagged)
}

/// The PLV dataset in `final_dataset_col_order`.
///
/// Log rows come first in the join, so the output follows the trial order of
/// every participant.
///
/// # Errors
///
/// [`Error::Input`](crate::Error::Input) when a join key or an output column is missing, or when
/// the logs disagree on their columns.
pub fn tracking_dataset(
    tracking: &Table,
    participants: &Table,
    logs: &[(String, Table)],
    cfg: &DatasetConfig,
) -> Result<Table> {
    let merged = tracking.inner_join(participants, &["participant_id"])?;
    let mut dataset = stack_logs(logs)?.inner_join(&merged, &["participant_id", "stimulus_id"])?;

    let stimulus = dataset.column("stimulus_id")?;
    let channel = dataset.column("channel_id")?;
    dataset.add_column("condition", |row| condition_label(&row[stimulus], &cfg.context_prefix).to_string());
    dataset.add_column("cluster", |row| cluster_of(&row[channel], cfg).unwrap_or_default().to_string());
    let cluster = dataset.column("cluster")?;
    let dataset = dataset.filter(|row| !row[cluster].is_empty());
    dataset.select(&cfg.final_dataset_col_order)
}

/// A measure table with the participant columns appended.
pub fn with_participants(measures: &Table, participants: &Table) -> Result<Table> {
    measures.inner_join(participants, &["participant_id"])
}

fn read_logs(cfg: &DatasetConfig) -> anyhow::Result<Vec<(String, Table)>> {
    cfg.participants()
        .into_iter()
        .map(|p| -> anyhow::Result<(String, Table)> {
            let path = cfg.logs_folder.join(format!("{p}{}", cfg.logs_txt_extension));
            let log = read_table(&path, '\t')?;
            Ok((p, log))
        })
        .collect()
}

fn write_table(table: &Table, path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    table.write_csv(std::io::BufWriter::new(file))
}

/// Paths of the three datasets written by [`build_datasets`].
#[derive(Debug, Clone)]
pub struct DatasetPaths {
    pub tracking: PathBuf,
    pub aep: PathBuf,
    pub n400: PathBuf,
}

/// Read the stage outputs, merge them and write the tracking, AEP and N400
/// datasets to `data_folder`.
pub fn build_datasets(cfg: &DatasetConfig) -> anyhow::Result<DatasetPaths> {
    cfg.validate()?;
    let participants = read_table(&cfg.participant_file, ',')?;
    let tracking = read_table(&cfg.tracking_file, ',')?;
    let logs = read_logs(cfg)?;
    info!("{} PLV rows, {} participants, {} logs", tracking.len(), participants.len(), logs.len());

    std::fs::create_dir_all(&cfg.data_folder).with_context(|| format!("creating {}", cfg.data_folder.display()))?;
    let paths = DatasetPaths {
        tracking: cfg.data_folder.join(&cfg.csv_filename),
        aep: cfg.data_folder.join(&cfg.aep_filename),
        n400: cfg.data_folder.join(&cfg.n400_filename),
    };

    let dataset = tracking_dataset(&tracking, &participants, &logs, cfg).context("building the tracking dataset")?;
    write_table(&dataset, &paths.tracking)?;
    info!("Tracking dataset: {} rows → {}", dataset.len(), paths.tracking.display());

    for (source, out) in [(&cfg.aep_file, &paths.aep), (&cfg.n400_file, &paths.n400)] {
        let measures = read_table(source, ',')?;
        let merged = with_participants(&measures, &participants)
            .with_context(|| format!("merging {} with participants", source.display()))?;
        write_table(&merged, out)?;
        info!("{} rows → {}", merged.len(), out.display());
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn table(text: &str) -> Table {
        Table::parse(text, ',').unwrap()
    }

    #[test]
    fn condition_follows_the_prefix() {
        assert_eq!(condition_label("con012", "con"), "context");
        assert_eq!(condition_label("ran012", "con"), "random");
        assert_eq!(condition_label("co", "con"), "random");
    }

    #[test]
    fn channels_map_to_their_cluster() {
        let cfg = DatasetConfig::default();
        assert_eq!(cluster_of("Cz", &cfg), Some("central"));
        assert_eq!(cluster_of("Pz", &cfg), Some("parietal"));
        assert_eq!(cluster_of("O1", &cfg), None);
    }

    #[test]
    fn logs_are_tagged_and_renamed() {
        let logs = vec![
            ("p01".to_string(), Table::parse("file\thit\ncon001\t1\n", '\t').unwrap()),
            ("p02".to_string(), Table::parse("file\thit\nran002\t0\n", '\t').unwrap()),
        ];
        let stacked = stack_logs(&logs).unwrap();
        assert_eq!(stacked.columns(), ["stimulus_id", "correct", "participant_id"]);
        assert_eq!(stacked.values("participant_id").unwrap(), ["p01", "p02"]);

        let ragged = vec![("p01".to_string(), table("file\ncon001\n")), logs[1].clone()];
        assert!(matches!(stack_logs(&ragged), Err(Error::Input(_))));
    }

    #[test]
    fn measures_gain_participant_columns() {
        let aep = table("participant_id,P1_latency\np01,0.05\np02,0.06\n");
        let people = table("participant_id,age\np02,30\np01,25\n");
        let merged = with_participants(&aep, &people).unwrap();
        assert_eq!(merged.columns(), ["participant_id", "P1_latency", "age"]);
        assert_eq!(merged.values("age").unwrap(), ["25", "30"]);
    }
}
