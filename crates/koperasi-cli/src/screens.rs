// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::config::Config;
use anyhow::{Result, bail};
use koperasi_app::{
    DependentFetchSpec, FieldSchema, FormMessages, MonthRangeParams, Notifier, Schema,
    ScreenConfig, ScreenMessages, SelectOption, SubmitPolicy, Values, display_json,
    value_is_empty,
};
use serde_json::Value;

pub const SCREEN_NAMES: [&str; 4] = ["savings", "loans", "loan-settlement", "settlements"];

const SAVINGS_PATH: &str = "/api/savings";
const SAVINGS_CALCULATE_PATH: &str = "/api/savings/calculate";
const LOANS_PATH: &str = "/api/loans";
const SETTLEMENT_PATH: &str = "/api/settlement";

/// A table column: header label and the JSON pointer read from each row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub label: &'static str,
    pub pointer: &'static str,
}

const fn column(label: &'static str, pointer: &'static str) -> Column {
    Column { label, pointer }
}

const SAVINGS_COLUMNS: [Column; 5] = [
    column("Nama Karyawan", "/user/name"),
    column("Bulan", "/date"),
    column("Jenis Simpanan", "/type"),
    column("Besar Simpanan", "/value"),
    column("Bagi Hasil", "/bagi_hasil"),
];

const LOAN_COLUMNS: [Column; 4] = [
    column("Tanggal", "/apply_date"),
    column("Besar Pinjaman", "/amount"),
    column("Status", "/status"),
    column("Status Pelunasan", "/settlement_status"),
];

/// Savings totals; a total missing from the response renders as zero.
const SAVINGS_SUMMARY: [Column; 3] = [
    column("Total Simpanan Wajib", "/total_wajib"),
    column("Total Simpanan Pokok", "/total_pokok"),
    column("Total Bagi Hasil", "/total_bagi_hasil"),
];

const SETTLEMENT_COLUMNS: [Column; 5] = [
    column("Tanggal Pelunasan", "/settlement_date"),
    column("Nama Karyawan", "/user/name"),
    column("Besar Pinjaman", "/amount"),
    column("Bukti Transfer", "/proof_path"),
    column("Status", "/status"),
];

#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub config: ScreenConfig,
    pub columns: &'static [Column],
    pub summary: &'static [Column],
}

impl CatalogEntry {
    /// One display cell per column; missing or null values render as `-`.
    pub fn cells(&self, row: &Value) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| {
                row.pointer(column.pointer)
                    .and_then(display_json)
                    .unwrap_or_else(|| "-".to_owned())
            })
            .collect()
    }

    pub fn headers(&self) -> Vec<&'static str> {
        self.columns.iter().map(|column| column.label).collect()
    }

    /// One `label: Rp amount` line per summary card. Empty when the screen
    /// has no cards or the response carried no summary.
    pub fn summary_lines(&self, summary: Option<&Value>) -> Vec<String> {
        let Some(summary) = summary else {
            return Vec::new();
        };
        self.summary
            .iter()
            .map(|card| {
                let amount = summary
                    .pointer(card.pointer)
                    .and_then(display_json)
                    .unwrap_or_else(|| "0".to_owned());
                format!("{}: Rp {amount}", card.label)
            })
            .collect()
    }
}

pub fn catalog_entry(name: &str, config: &Config) -> Result<CatalogEntry> {
    let entry = match name {
        "savings" => CatalogEntry {
            config: savings(config)?,
            columns: &SAVINGS_COLUMNS,
            summary: &SAVINGS_SUMMARY,
        },
        "loans" => CatalogEntry {
            config: loans(config)?,
            columns: &LOAN_COLUMNS,
            summary: &[],
        },
        "loan-settlement" => CatalogEntry {
            config: loan_settlement(config)?,
            columns: &LOAN_COLUMNS,
            summary: &[],
        },
        "settlements" => CatalogEntry {
            config: settlements(config)?,
            columns: &SETTLEMENT_COLUMNS,
            summary: &[],
        },
        unknown => bail!(
            "unknown screen {unknown:?}; choose one of: {}",
            SCREEN_NAMES.join(", ")
        ),
    };
    Ok(entry)
}

fn paged(screen: ScreenConfig, config: &Config) -> ScreenConfig {
    screen.with_page_sizes(config.default_page_size(), &config.page_sizes())
}

fn application_status_options() -> [SelectOption; 3] {
    [
        SelectOption::new("applied", "Applied"),
        SelectOption::new("approved", "Approved"),
        SelectOption::new("rejected", "Rejected"),
    ]
}

fn saving_type_options() -> [SelectOption; 2] {
    [
        SelectOption::new("wajib", "Simpanan Wajib"),
        SelectOption::new("pokok", "Simpanan Pokok"),
    ]
}

/// Annual profit sharing only applies to mandatory savings with every input
/// filled in.
fn profit_share_ready(values: &Values) -> bool {
    ["user_id", "date", "value"]
        .iter()
        .all(|key| !value_is_empty(values, key))
        && values.get("type").is_some_and(|kind| kind == "wajib")
}

fn savings(config: &Config) -> Result<ScreenConfig> {
    let filters = Schema::new(vec![
        FieldSchema::month("date", "Bulan"),
        FieldSchema::select("type", "Jenis Simpanan", saving_type_options()),
    ])?;
    // Member options come from the user directory at runtime; an empty option
    // list accepts any id.
    let inputs = Schema::new(vec![
        FieldSchema::hidden("id"),
        FieldSchema::select("user_id", "Karyawan", []).required(),
        FieldSchema::date("date", "Tanggal").required(),
        FieldSchema::number("value", "Besar Simpanan").required(),
        FieldSchema::select("type", "Jenis Simpanan", saving_type_options()).required(),
        FieldSchema::number("bagi_hasil", "Total Bagi Hasil Tahunan")
            .readonly()
            .with_dependent_fetch(DependentFetchSpec::new(
                SAVINGS_CALCULATE_PATH,
                ["id", "user_id", "value", "date", "type"],
                "bagi_hasil_tahunan",
                profit_share_ready,
            )),
    ])?;

    let screen = ScreenConfig::new("savings", "Daftar Simpanan", SAVINGS_PATH, filters, inputs)
        .with_month_params(config.month_params())
        .with_messages(ScreenMessages {
            load_failed: "Gagal mengambil data simpanan".to_owned(),
            form: FormMessages {
                added: "Berhasil menambahkan data simpanan".to_owned(),
                add_failed: "Gagal menambahkan data simpanan".to_owned(),
                updated: "Berhasil mengubah data simpanan".to_owned(),
                update_failed: "Gagal mengubah data simpanan".to_owned(),
            },
            deleted: "Berhasil menghapus data simpanan".to_owned(),
            delete_failed: "Gagal menghapus data simpanan".to_owned(),
        });
    Ok(paged(screen, config))
}

fn loans(config: &Config) -> Result<ScreenConfig> {
    let filters = loan_filters()?;
    let inputs = Schema::new(vec![
        FieldSchema::date("apply_date", "Tanggal Pengajuan").required(),
        FieldSchema::text("nama", "Nama Karyawan").readonly(),
        FieldSchema::number("amount", "Besar Pinjaman (Rp)").required(),
        FieldSchema::text("phone", "No Telepon").required(),
        FieldSchema::text("address", "Alamat").required(),
    ])?;

    // The loans endpoint names its range parameters differently from the
    // other lists.
    let screen = ScreenConfig::new("loans", "Daftar Pinjaman", LOANS_PATH, filters, inputs)
        .with_month_params(MonthRangeParams::new("date_start", "date_end"))
        .with_messages(ScreenMessages {
            load_failed: "Gagal mengambil data pinjaman".to_owned(),
            form: FormMessages {
                added: "Pengajuan pinjaman berhasil".to_owned(),
                add_failed: "Gagal mengajukan pinjaman".to_owned(),
                updated: "Berhasil mengubah data pinjaman".to_owned(),
                update_failed: "Gagal mengubah data pinjaman".to_owned(),
            },
            deleted: "Berhasil menghapus data pinjaman".to_owned(),
            delete_failed: "Gagal menghapus data pinjaman".to_owned(),
        });
    Ok(paged(screen, config))
}

fn loan_filters() -> Result<Schema> {
    Schema::new(vec![
        FieldSchema::month("date", "Bulan"),
        FieldSchema::select("status", "Status", application_status_options()),
    ])
}

/// A member's own loans, with proof-of-transfer upload that opens a
/// settlement for one of them.
fn loan_settlement(config: &Config) -> Result<ScreenConfig> {
    let inputs = Schema::new(vec![
        FieldSchema::hidden("loan_id").required(),
        FieldSchema::file("proof_path", "Bukti Transfer").required(),
    ])?;

    let screen = ScreenConfig::new(
        "loan-settlement",
        "Pelunasan Pinjaman",
        SETTLEMENT_PATH,
        loan_filters()?,
        inputs,
    )
    .with_list_path(LOANS_PATH)
    .with_month_params(MonthRangeParams::new("date_start", "date_end"))
    .with_messages(ScreenMessages {
        load_failed: "Gagal mengambil data pinjaman".to_owned(),
        form: FormMessages {
            added: "Bukti transfer berhasil diunggah".to_owned(),
            add_failed: "Gagal upload bukti transfer".to_owned(),
            updated: "Bukti transfer berhasil diunggah".to_owned(),
            update_failed: "Gagal upload bukti transfer".to_owned(),
        },
        deleted: "Berhasil menghapus data pelunasan".to_owned(),
        delete_failed: "Gagal menghapus data pelunasan".to_owned(),
    });
    Ok(paged(screen, config))
}

fn settlements(config: &Config) -> Result<ScreenConfig> {
    let filters = Schema::new(vec![
        FieldSchema::text("nama", "Nama Karyawan"),
        FieldSchema::date("tanggal", "Tanggal Pelunasan"),
        FieldSchema::select("status", "Status", application_status_options()),
    ])?;
    let inputs = Schema::new(vec![
        FieldSchema::select(
            "status",
            "Status",
            [
                SelectOption::new("approved", "Approve"),
                SelectOption::new("rejected", "Reject"),
            ],
        )
        .required(),
    ])?;

    let screen = ScreenConfig::new(
        "settlements",
        "Data Pelunasan",
        SETTLEMENT_PATH,
        filters,
        inputs,
    )
    .with_submit_policy(SubmitPolicy::post_to_record())
    .with_month_params(config.month_params())
    .with_messages(ScreenMessages {
        load_failed: "Gagal mengambil data pelunasan".to_owned(),
        form: FormMessages {
            added: "Berhasil menambahkan data pelunasan".to_owned(),
            add_failed: "Gagal menambahkan data pelunasan".to_owned(),
            updated: "Berhasil mengubah status pelunasan".to_owned(),
            update_failed: "Gagal mengubah status pelunasan".to_owned(),
        },
        deleted: "Berhasil menghapus data pelunasan".to_owned(),
        delete_failed: "Gagal menghapus data pelunasan".to_owned(),
    });
    Ok(paged(screen, config))
}

/// Toasts for a terminal: errors on stderr, successes on stdout.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify_error(&self, message: &str) {
        tracing::debug!(target: "koperasi::screen", message, "error notification");
        eprintln!("error: {message}");
    }

    fn notify_success(&self, message: &str) {
        tracing::debug!(target: "koperasi::screen", message, "success notification");
        println!("{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::{SCREEN_NAMES, catalog_entry, profit_share_ready};
    use crate::config::Config;
    use anyhow::Result;
    use koperasi_app::{FieldKind, FormMode, SubmitMethod, SubmitPath};
    use koperasi_testkit::{MemberFaker, temp_config_path, values};
    use serde_json::json;

    #[test]
    fn every_listed_screen_builds() -> Result<()> {
        let config = Config::default();
        for name in SCREEN_NAMES {
            let entry = catalog_entry(name, &config)?;
            assert_eq!(entry.config.name, name);
            assert_eq!(entry.headers().len(), entry.columns.len());
        }
        Ok(())
    }

    #[test]
    fn unknown_screen_lists_choices() {
        let error = catalog_entry("dashboard", &Config::default()).expect_err("unknown screen");
        let message = error.to_string();
        assert!(
            message.contains("savings, loans, loan-settlement, settlements"),
            "{message}"
        );
    }

    #[test]
    fn savings_profit_share_depends_on_every_input() -> Result<()> {
        let entry = catalog_entry("savings", &Config::default())?;
        let field = entry
            .config
            .inputs
            .field("bagi_hasil")
            .expect("bagi_hasil field");
        assert!(field.readonly);
        let spec = field.dependent_fetch.as_ref().expect("dependent fetch");
        assert_eq!(spec.resource_path, "/api/savings/calculate");
        assert_eq!(spec.result_field, "bagi_hasil_tahunan");
        for key in ["user_id", "date", "value", "type"] {
            assert!(spec.is_triggered_by(key), "{key}");
        }
        Ok(())
    }

    #[test]
    fn profit_share_is_ready_only_for_filled_mandatory_savings() {
        let filled = values(&[
            ("user_id", "4"),
            ("date", "2024-02-10"),
            ("value", "100000"),
            ("type", "wajib"),
        ]);
        assert!(profit_share_ready(&filled));

        let mut voluntary = filled.clone();
        voluntary.insert("type".to_owned(), "pokok".to_owned());
        assert!(!profit_share_ready(&voluntary));

        let mut blank = filled;
        blank.insert("value".to_owned(), " ".to_owned());
        assert!(!profit_share_ready(&blank));
    }

    #[test]
    fn loans_expand_months_into_their_own_parameters() -> Result<()> {
        let entry = catalog_entry("loans", &Config::default())?;
        assert_eq!(entry.config.month_params.start, "date_start");
        assert_eq!(entry.config.month_params.end, "date_end");
        assert_eq!(entry.config.list_path, "/api/loans");
        Ok(())
    }

    #[test]
    fn savings_and_settlements_follow_configured_month_params() -> Result<()> {
        let (_temp, path) = temp_config_path()?;
        std::fs::write(
            &path,
            "version = 1\n[filters]\nmonth_start_param = \"dari\"\nmonth_end_param = \"sampai\"\n",
        )?;
        let config = Config::load(&path)?;
        for name in ["savings", "settlements"] {
            let entry = catalog_entry(name, &config)?;
            assert_eq!(entry.config.month_params.start, "dari");
            assert_eq!(entry.config.month_params.end, "sampai");
        }
        Ok(())
    }

    #[test]
    fn settlement_decisions_post_to_the_record() -> Result<()> {
        let entry = catalog_entry("settlements", &Config::default())?;
        let target = entry.config.submit_policy.target(FormMode::Update);
        assert_eq!(target.method, SubmitMethod::Post);
        assert_eq!(target.path, SubmitPath::Record);
        assert_eq!(
            target.resolve(&entry.config.collection_path, Some("12"))?,
            "/api/settlement/12"
        );
        let tanggal = entry.config.filters.field("tanggal").expect("tanggal filter");
        assert_eq!(tanggal.kind, FieldKind::Date);
        Ok(())
    }

    #[test]
    fn screens_use_configured_page_sizes() -> Result<()> {
        let (_temp, path) = temp_config_path()?;
        std::fs::write(
            &path,
            "version = 1\n[list]\ndefault_page_size = 50\npage_sizes = [20, 50]\n",
        )?;
        let config = Config::load(&path)?;
        let entry = catalog_entry("loans", &config)?;
        assert_eq!(entry.config.default_page_size, 50);
        assert_eq!(entry.config.page_sizes, vec![20, 50]);
        Ok(())
    }

    #[test]
    fn cells_follow_nested_pointers_and_dash_missing_values() -> Result<()> {
        let entry = catalog_entry("savings", &Config::default())?;
        let row = MemberFaker::new(11).savings_row(1);
        let cells = entry.cells(&row);
        assert_eq!(cells.len(), 5);
        assert_eq!(Some(cells[0].as_str()), row["user"]["name"].as_str());
        assert_eq!(cells[3], row["value"].to_string());
        assert_eq!(cells[4], "-");

        let sparse = entry.cells(&json!({ "user": null }));
        assert!(sparse.iter().all(|cell| cell == "-"));
        Ok(())
    }

    #[test]
    fn loan_settlement_lists_loans_and_uploads_to_settlements() -> Result<()> {
        let entry = catalog_entry("loan-settlement", &Config::default())?;
        assert_eq!(entry.config.list_path, "/api/loans");
        assert_eq!(entry.config.collection_path, "/api/settlement");
        assert_eq!(entry.config.month_params.start, "date_start");
        let proof = entry
            .config
            .inputs
            .field("proof_path")
            .expect("proof field");
        assert_eq!(proof.kind, FieldKind::File);
        assert!(proof.required);
        Ok(())
    }

    #[test]
    fn savings_summary_defaults_missing_totals_to_zero() -> Result<()> {
        let entry = catalog_entry("savings", &Config::default())?;
        assert!(entry.summary_lines(None).is_empty());
        assert_eq!(
            entry.summary_lines(Some(&json!({"total_wajib": 150000, "total_bagi_hasil": 4500}))),
            [
                "Total Simpanan Wajib: Rp 150000",
                "Total Simpanan Pokok: Rp 0",
                "Total Bagi Hasil: Rp 4500",
            ]
        );

        let loans = catalog_entry("loans", &Config::default())?;
        assert!(loans.summary_lines(Some(&json!({"total_wajib": 1}))).is_empty());
        Ok(())
    }
}
