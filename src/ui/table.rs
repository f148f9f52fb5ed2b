use tabled::{settings::Style, Table, Tabled};
use crate::presence::PresenceRecord;
use crate::provenance::ProvenanceRecord;
use crate::stats::DbStats;

#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Value")]
    value: usize,
}

#[derive(Tabled)]
struct PresenceRow<'a> {
    #[tabled(rename = "Network")]
    network_id: i64,
    #[tabled(rename = "User")]
    user_id: &'a str,
    #[tabled(rename = "Status")]
    status_id: i64,
}

#[derive(Tabled)]
struct SourceRow<'a> {
    #[tabled(rename = "Id")]
    source_id: i64,
    #[tabled(rename = "Source")]
    source: &'a str,
}

fn render<T: Tabled>(rows: Vec<T>) -> String {
    if rows.is_empty() {
        return String::new();
    }
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn presence_table(records: &[PresenceRecord]) -> String {
    render(
        records
            .iter()
            .map(|r| PresenceRow {
                network_id: r.network_id,
                user_id: &r.user_id,
                status_id: r.status_id,
            })
            .collect(),
    )
}

pub fn sources_table(records: &[ProvenanceRecord]) -> String {
    render(
        records
            .iter()
            .map(|r| SourceRow {
                source_id: r.source_id,
                source: &r.source,
            })
            .collect(),
    )
}

pub fn stats_table(stats: &DbStats) -> String {
    render(vec![
        MetricRow { metric: "Contact sources", value: stats.contact_sources },
        MetricRow { metric: "Contacts", value: stats.contacts },
        MetricRow { metric: "Presence networks", value: stats.presence_networks },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tables_render_nothing() {
        assert!(presence_table(&[]).is_empty());
        assert!(sources_table(&[]).is_empty());
    }

    #[test]
    fn test_presence_table_lists_networks() {
        let rendered = presence_table(&[PresenceRecord::new("u1", 7, 5)]);
        assert!(rendered.contains("Network"));
        assert!(rendered.contains("u1"));
    }
}
