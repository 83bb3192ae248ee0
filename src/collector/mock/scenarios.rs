//! Pre-built mock server scenarios.
//!
//! These provide realistic performance_schema contents for tests and for
//! running the viewer without a server (`--demo`).

use super::executor::MockExecutor;
use crate::collector::traits::Value;

fn row(name: &str, counters: &[u64]) -> Vec<Value> {
    let mut cols = Vec::with_capacity(counters.len() + 1);
    cols.push(Value::Text(name.to_string()));
    cols.extend(counters.iter().map(|&c| Value::UInt(c)));
    cols
}

impl MockExecutor {
    /// A MySQL 8 server with moderate load.
    ///
    /// Statement counters grow over the first three polls, then stay flat.
    pub fn typical_server() -> Self {
        let mock = Self::new();

        for step in 0..3u64 {
            mock.push_rows(
                "events_statements_summary_global_by_event_name",
                vec![
                    row(
                        "statement/sql/select",
                        &[
                            1_134_010_657_232_000 + step * 9_000_000_000,
                            2_366_024 + step * 1_500,
                            15_832_115 + step * 20_000,
                        ],
                    ),
                    row(
                        "statement/sql/insert",
                        &[
                            358_676_581_245_000 + step * 2_000_000_000,
                            102_965 + step * 90,
                            0,
                        ],
                    ),
                    row(
                        "statement/sql/delete",
                        &[156_619_895_487_000, 539_253, 799_185],
                    ),
                    row(
                        "statement/com/Quit",
                        &[
                            1_278_334_466_000 + step * 1_000_000,
                            148_486 + step * 10,
                            0,
                        ],
                    ),
                ],
            );
        }

        mock.push_rows(
            "events_stages_summary_global_by_event_name",
            vec![
                row("stage/sql/Sending data", &[901_234_000_000, 120_000]),
                row("stage/sql/Opening tables", &[12_340_000_000, 98_000]),
                row("stage/sql/init", &[5_000_000_000, 250_000]),
            ],
        );

        mock.push_rows(
            "events_waits_summary_global_by_event_name",
            vec![
                row("wait/synch/mutex/innodb/trx_sys_mutex", &[88_000_000_000, 1_200_000]),
                row("wait/synch/mutex/sql/LOCK_open", &[4_500_000_000, 330_000]),
            ],
        );

        mock.push_rows(
            "file_summary_by_instance",
            vec![
                row(
                    "/var/lib/mysql/ibdata1",
                    &[
                        55_000_000_000,
                        20_000_000_000,
                        35_000_000_000,
                        1_048_576,
                        8_388_608,
                        1_500,
                    ],
                ),
                row(
                    "/var/lib/mysql/#ib_redo/#ib_redo10",
                    &[31_000_000_000, 0, 31_000_000_000, 0, 67_108_864, 9_000],
                ),
                row(
                    "/var/lib/mysql/shop/orders.ibd",
                    &[
                        7_500_000_000,
                        7_000_000_000,
                        500_000_000,
                        33_554_432,
                        65_536,
                        2_100,
                    ],
                ),
            ],
        );

        mock.push_rows(
            "table_io_waits_summary_by_table",
            vec![
                row(
                    "shop.orders",
                    &[
                        70_000_000_000,
                        60_000_000_000,
                        8_000_000_000,
                        1_500_000_000,
                        500_000_000,
                        450_000,
                    ],
                ),
                row("shop.customers", &[9_000_000_000, 9_000_000_000, 0, 0, 0, 80_000]),
            ],
        );

        mock.push_rows(
            "memory_summary_global_by_event_name",
            vec![
                row("memory/innodb/buf_buf_pool", &[137_428_992, 137_428_992, 1]),
                row("memory/sql/TABLE", &[2_097_152, 4_194_304, 320]),
            ],
        );

        mock.push_rows("GLOBAL_STATUS", vec![vec![Value::Text("251107".to_string())]]);
        mock.push_rows("@@datadir", vec![vec![Value::Text("/var/lib/mysql/".to_string())]]);
        mock.push_rows("@@version", vec![vec![Value::Text("8.0.36".to_string())]]);
        mock.push_rows("setup_instruments", Vec::new());

        mock
    }
}

#[cfg(test)]
mod tests {
    use crate::collector::QueryExecutor;
    use crate::collector::mock::MockExecutor;

    #[test]
    fn typical_server_answers_every_table() {
        let mock = MockExecutor::typical_server();
        for table in [
            "events_statements_summary_global_by_event_name",
            "events_stages_summary_global_by_event_name",
            "events_waits_summary_global_by_event_name",
            "file_summary_by_instance",
            "table_io_waits_summary_by_table",
            "memory_summary_global_by_event_name",
        ] {
            let rows = mock.query(&format!("SELECT * FROM {}", table)).unwrap();
            assert!(!rows.is_empty(), "{} should have rows", table);
        }
    }
}
