use disbursement_analytics::*;

const PROJECTS_CSV: &str = "\
NoProyecto,IDAreaPrioritaria,IDAreaIntervencion,Nombre
1,10,20,Ruta Norte
2,11,21,Puente Sur
";

const OPERATIONS_CSV: &str = "\
NoProyecto,NoOperacion,IDEtapa,Alias,Pais,FechaVigencia,Estado,AporteFONPLATAVigente,Sector
1,100,100,RN-1,PY,01/01/2020,Vigente,\"4.000.000,00\",Transporte
1,101,101,RN-2,PY,01/07/2020,Vigente,2000000,Transporte
2,200,200,PS-1,BO,15/03/2019,Vigente,\"1.000.000\",Infraestructura
";

const DISBURSEMENTS_CSV: &str = "\
IDDesembolso,NoOperacion,IDOperacion,Monto,FechaEfectiva
1,100,100,\"1.000.000,00\",01/02/2020
2,100,100,\"1.000.000,00\",15/03/2021
3,100,100,\"2.000.000,00\",20/05/2022
4,101,101,\"500.000,00\",01/08/2020
5,101,101,\"1.500.000,00\",10/09/2021
6,200,200,\"250.000,00\",01/04/2019
7,200,200,\"750.000,00\",01/01/2019
8,200,200,abc,01/06/2020
9,999,999,\"300.000,00\",01/01/2021
10,100,100,\"100.000,00\",fecha
";

fn load(reference_key: ReferenceKey) -> RawTables {
    RawTables::from_csv_readers(
        PROJECTS_CSV.as_bytes(),
        OPERATIONS_CSV.as_bytes(),
        DISBURSEMENTS_CSV.as_bytes(),
        reference_key,
    )
    .unwrap()
}

fn run(config: PipelineConfig) -> PipelineOutput {
    let tables = load(config.reference_key);
    process_disbursements(&tables, &config).unwrap()
}

#[test]
fn test_minimal_end_to_end_scenario() {
    let projects = "NoProyecto,IDAreaPrioritaria,IDAreaIntervencion\n1,10,20\n";
    let operations = "NoProyecto,NoOperacion,IDEtapa,Alias,Pais,FechaVigencia,Estado,AporteFONPLATAVigente\n\
                      1,100,100,A,PY,01/01/2020,Vigente,1000000\n";
    let disbursements = "IDDesembolso,NoOperacion,Monto,FechaEfectiva\n1,100,\"500.000,00\",01/01/2021\n";

    let tables = RawTables::from_csv_readers(
        projects.as_bytes(),
        operations.as_bytes(),
        disbursements.as_bytes(),
        ReferenceKey::OperationNumber,
    )
    .unwrap();

    let output =
        process_disbursements(&tables, &PipelineConfig::new(ReferenceKey::OperationNumber)).unwrap();

    assert_eq!(output.records.len(), 1);
    assert_eq!(output.records[0].elapsed_year, 1);
    assert_eq!(output.records[0].amount, Some(500_000.0));

    let year_one = output.yearly.iter().find(|r| r.year == 1).unwrap();
    assert_eq!(year_one.amount, 0.5);
    assert_eq!(year_one.percentage, Some(50.0));
}

#[test]
fn test_no_negative_years_survive() {
    let output = run(PipelineConfig::new(ReferenceKey::OperationNumber));

    // 7 precedes its vigency, 9 is orphaned, 10 has no valid date.
    let ids: Vec<&str> = output
        .records
        .iter()
        .filter_map(|r| r.disbursement_id.as_deref())
        .collect();
    assert_eq!(ids, vec!["1", "2", "3", "4", "5", "6", "8"]);
    assert_eq!(output.orphaned_disbursements, 1);

    for record in &output.records {
        assert!(record.effective_date >= record.vigency_date);
    }
}

#[test]
fn test_early_disbursement_excluded_from_aggregates_and_pivots() {
    let output = run(PipelineConfig::new(ReferenceKey::OperationNumber).with_stages(["200"]));

    // Only 6 (250k, year 0) and 8 (unparseable amount, year 1) remain for stage 200.
    let total: f64 = output.stage_years.iter().map(|r| r.amount).sum();
    assert!((total - 0.25).abs() < 1e-9);
    assert_eq!(output.amount_pivot.row("200").unwrap().total, 0.25);
    assert_eq!(output.yearly[0].percentage, Some(25.0));
}

#[test]
fn test_missing_amount_is_not_zero_but_contributes_nothing() {
    let output = run(PipelineConfig::new(ReferenceKey::OperationNumber));

    let unparsed = output
        .records
        .iter()
        .find(|r| r.disbursement_id.as_deref() == Some("8"))
        .unwrap();
    assert_eq!(unparsed.amount, None);
    assert_eq!(unparsed.share_of_commitment, None);

    let stage_200: Vec<&StageYearRow> = output
        .stage_years
        .iter()
        .filter(|r| r.stage_id == "200")
        .collect();
    assert_eq!(stage_200.len(), 2);
    assert_eq!(stage_200[1].amount, 0.0);
}

#[test]
fn test_cumulative_matches_group_sum_per_stage() {
    let output = run(PipelineConfig::new(ReferenceKey::OperationNumber));

    let mut stages: Vec<String> = output.stage_years.iter().map(|r| r.stage_id.clone()).collect();
    stages.dedup();
    assert_eq!(stages, vec!["100", "101", "200"]);

    for stage in &stages {
        let rows: Vec<&StageYearRow> = output
            .stage_years
            .iter()
            .filter(|r| &r.stage_id == stage)
            .collect();

        let sum: f64 = rows.iter().map(|r| r.amount).sum();
        let last = rows.last().unwrap();
        assert!((last.cumulative_amount - sum).abs() < 0.011, "stage {stage}");

        let pct: f64 = rows.iter().filter_map(|r| r.percentage).sum();
        assert!((pct - 100.0).abs() < 0.05, "stage {stage} percentages sum to {pct}");
        assert_eq!(last.cumulative_percentage, Some(100.0));
    }
}

#[test]
fn test_stage_year_rows_for_operation_100() {
    let output = run(PipelineConfig::new(ReferenceKey::OperationNumber));
    let rows: Vec<&StageYearRow> = output
        .stage_years
        .iter()
        .filter(|r| r.stage_id == "100")
        .collect();

    assert_eq!(rows.iter().map(|r| r.year).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(rows[0].amount, 1.0);
    assert_eq!(rows[2].cumulative_amount, 4.0);
    assert_eq!(rows[0].percentage, Some(25.0));
    assert_eq!(rows[1].cumulative_percentage, Some(50.0));
    assert_eq!(rows[2].percentage, Some(50.0));
}

#[test]
fn test_pivot_totals_equal_row_sums() {
    let output = run(PipelineConfig::new(ReferenceKey::OperationNumber));

    for pivot in [&output.amount_pivot, &output.percentage_pivot] {
        assert_eq!(pivot.years, vec![0, 1, 2]);
        for row in &pivot.rows {
            let sum: f64 = row.cells.iter().sum();
            assert!((row.total - sum).abs() < 0.01);
        }
    }

    assert_eq!(output.amount_pivot.get("101", 2), Some(0.0));
    assert_eq!(output.amount_pivot.row("100").unwrap().total, 4.0);
    assert_eq!(output.percentage_pivot.row("100").unwrap().total, 100.0);
    assert_eq!(output.percentage_pivot.get("101", 1), Some(75.0));
}

#[test]
fn test_country_filter_changes_percentage_denominator() {
    // Without a filter the first record belongs to operation 100 (4M committed).
    let all = run(PipelineConfig::new(ReferenceKey::OperationNumber));
    let all_year_zero = all.yearly.iter().find(|r| r.year == 0).unwrap();

    // Filtering to BO leaves only operation 200 (1M committed).
    let bolivia = run(PipelineConfig::new(ReferenceKey::OperationNumber).with_countries(["BO"]));
    let bo_year_zero = bolivia.yearly.iter().find(|r| r.year == 0).unwrap();

    assert_eq!(bo_year_zero.amount, 0.25);
    assert_eq!(bo_year_zero.percentage, Some(25.0));
    assert_ne!(all_year_zero.percentage, bo_year_zero.percentage);

    assert!(bolivia.records.iter().all(|r| r.country.as_deref() == Some("BO")));
    assert_eq!(bolivia.amount_pivot.rows.len(), 1);
}

#[test]
fn test_stage_reference_key_with_inner_join() {
    let config = PipelineConfig::new(ReferenceKey::StageId).with_join_mode(JoinMode::Inner);
    let output = run(config);

    assert_eq!(output.orphaned_disbursements, 1);
    assert_eq!(output.records.len(), 7);
    assert!(output.records.iter().all(|r| r.stage_id.is_some()));
}

#[test]
fn test_year_length_366() {
    // Disbursement 2 lands 439 days after vigency; disbursement 5 lands 436 days after.
    let output = run(PipelineConfig::new(ReferenceKey::OperationNumber).with_year_length_days(366));
    let years: Vec<(Option<&str>, u32)> = output
        .records
        .iter()
        .map(|r| (r.disbursement_id.as_deref(), r.elapsed_year))
        .collect();

    assert!(years.contains(&(Some("2"), 1)));
    assert!(years.contains(&(Some("5"), 1)));
    assert!(years.contains(&(Some("3"), 2)));
}

#[test]
fn test_all_records_filtered_gives_empty_outputs() {
    let output = run(PipelineConfig::new(ReferenceKey::OperationNumber).with_countries(["AR"]));

    assert!(output.is_empty());
    assert!(output.stage_years.is_empty());
    assert!(output.yearly.is_empty());
    assert!(output.amount_pivot.is_empty());
    assert!(output.percentage_pivot.is_empty());

    let csv = String::from_utf8(to_csv_bytes(&output.yearly).unwrap()).unwrap();
    assert_eq!(
        csv.trim_end(),
        "year,amount,cumulative_amount,percentage,cumulative_percentage"
    );
}

#[test]
fn test_export_record_set() {
    let output = run(PipelineConfig::new(ReferenceKey::OperationNumber).with_stages(["101"]));
    let csv = String::from_utf8(to_csv_bytes(&output.records).unwrap()).unwrap();
    let mut lines = csv.lines();

    let header = lines.next().unwrap();
    assert_eq!(header.split(',').count(), DisbursementRecord::COLUMNS.len());
    assert!(header.starts_with("disbursement_id,reference,amount"));

    let first = lines.next().unwrap();
    assert!(first.starts_with("4,101,500000.0,0.5,2020-08-01,2020,1,101,101,RN-2,PY,2020-07-01"));
    assert_eq!(lines.count(), 1);
}

#[test]
fn test_stage_labels_for_selector() {
    let output = run(PipelineConfig::new(ReferenceKey::OperationNumber));
    let labels = stage_labels(&output.records);

    assert_eq!(
        labels.iter().map(|(_, label)| label.as_str()).collect::<Vec<_>>(),
        vec!["100 (RN-1)", "101 (RN-2)", "200 (PS-1)"]
    );
}

#[test]
fn test_config_from_ui_json() {
    let config = PipelineConfig::from_json(
        r#"{
            "reference_key": "IDOperacion",
            "join_mode": "inner",
            "year_length_days": 366,
            "selected_countries": ["PY"]
        }"#,
    )
    .unwrap();

    let pipeline = DisbursementPipeline::new(config).unwrap();
    let output = pipeline.run(&load(ReferenceKey::StageId));
    assert!(output.records.iter().all(|r| r.country.as_deref() == Some("PY")));
    assert_eq!(output.amount_pivot.rows.len(), 2);
}

#[test]
fn test_country_selection_resolves_shared_stage_to_selected_operation() {
    let operations = "NoProyecto,NoOperacion,IDEtapa,Alias,Pais,FechaVigencia,Estado,AporteFONPLATAVigente\n\
                      1,100,7,AR-7,AR,01/01/2020,Vigente,1000000\n\
                      1,200,7,PY-7,PY,01/01/2020,Vigente,2000000\n";
    let disbursements = "IDDesembolso,IDOperacion,Monto,FechaEfectiva\n1,7,\"500.000,00\",01/01/2021\n";

    let tables = RawTables::from_csv_readers(
        PROJECTS_CSV.as_bytes(),
        operations.as_bytes(),
        disbursements.as_bytes(),
        ReferenceKey::StageId,
    )
    .unwrap();

    let config = PipelineConfig::new(ReferenceKey::StageId).with_countries(["PY"]);
    let output = process_disbursements(&tables, &config).unwrap();

    assert_eq!(output.records.len(), 1);
    assert_eq!(output.orphaned_disbursements, 0);
    let record = &output.records[0];
    assert_eq!(record.country.as_deref(), Some("PY"));
    assert_eq!(record.operation_number.as_deref(), Some("200"));
    assert_eq!(record.share_of_commitment, Some(25.0));

    // Unfiltered, the first operation in input order still wins.
    let unfiltered =
        process_disbursements(&tables, &PipelineConfig::new(ReferenceKey::StageId)).unwrap();
    assert_eq!(unfiltered.records[0].country.as_deref(), Some("AR"));
}

#[test]
fn test_unknown_join_mode_from_ui_json_is_rejected_before_processing() {
    let err = PipelineConfig::from_json(r#"{"reference_key":"NoOperacion","join_mode":"outer"}"#)
        .unwrap_err();
    assert!(err.is_configuration_error());
    assert!(matches!(err, DisbursementError::InvalidJoinMode(_)));
}
