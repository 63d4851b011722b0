use disbursement_analytics::{
    process_disbursements, stage_labels, to_csv_bytes, JoinMode, PipelineConfig, RawTables,
    ReferenceKey,
};

const PROJECTS: &str = "\
NoProyecto,IDAreaPrioritaria,IDAreaIntervencion
1,10,20
2,11,21
";

const OPERATIONS: &str = "\
NoProyecto,NoOperacion,IDEtapa,Alias,Pais,FechaVigencia,Estado,AporteFONPLATAVigente
1,100,100,RN-1,PY,01/01/2020,Vigente,\"4.000.000,00\"
2,200,200,PS-1,BO,15/03/2019,Vigente,\"1.000.000,00\"
";

const DISBURSEMENTS: &str = "\
IDDesembolso,NoOperacion,Monto,FechaEfectiva
1,100,\"1.000.000,00\",01/02/2020
2,100,\"1.000.000,00\",15/03/2021
3,100,\"2.000.000,00\",20/05/2022
4,200,\"250.000,00\",01/04/2019
5,200,\"750.000,00\",01/01/2019
";

fn main() -> anyhow::Result<()> {
    let tables = RawTables::from_csv_readers(
        PROJECTS.as_bytes(),
        OPERATIONS.as_bytes(),
        DISBURSEMENTS.as_bytes(),
        ReferenceKey::OperationNumber,
    )?;

    let config = PipelineConfig::new(ReferenceKey::OperationNumber)
        .with_join_mode(JoinMode::Inner)
        .with_countries(["PY"]);

    let output = process_disbursements(&tables, &config)?;

    println!("Stages:");
    for (_, label) in stage_labels(&output.records) {
        println!(" - {}", label);
    }

    println!("\nDisbursed amount (millions) by stage and elapsed year:");
    println!("{}", output.amount_pivot.to_markdown());

    println!("Disbursed share of commitment (%) by stage and elapsed year:");
    println!("{}", output.percentage_pivot.to_markdown());

    println!("Yearly summary (CSV):");
    print!("{}", String::from_utf8(to_csv_bytes(&output.yearly)?)?);

    Ok(())
}
