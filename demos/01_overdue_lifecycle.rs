/// overdue lifecycle - watch an installment go overdue and get paid late
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use installment_billing_rs::{
    BillingService, EngineConfig, InMemoryStore, Money, NewClient, NewPaymentGroup,
    PaymentFilter, Rate, SafeTimeProvider, SessionContext, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== overdue lifecycle ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap(),
    ));
    let controller = time.test_control().unwrap();

    let service = BillingService::new(InMemoryStore::new(), EngineConfig::default());
    let session = SessionContext::without_expiry("demo-token");

    let client = service.create_client(
        &session,
        NewClient {
            client_name: "clínica bem estar".to_string(),
            address: "Av. Brasil, 500".to_string(),
            document: "123.456.789-09".to_string(),
            late_fee_rate: Some(Rate::from_percentage(2)),
            monthly_interest_rate: Some(Rate::from_percentage(1)),
            ..NewClient::default()
        },
        &time,
    )?;

    let group = service.create_payment_group(
        &session,
        NewPaymentGroup::builder()
            .client(client.id)
            .payer("Renata Souza", "529.982.247-25")
            .monthly_value(Money::from_major(100))
            .installments(3)
            .first_due_date(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap())
            .build()?,
        &time,
    )?;
    let first = group.installments[0].id;
    println!("group {} created on {}", group.group_name, time.now().format("%Y-%m-%d"));

    // walk the calendar forward and watch the first installment
    for days in [8, 1, 31, 29] {
        controller.advance(Duration::days(days));
        let listed = service.list_payments(&session, &PaymentFilter::default(), &time)?;
        for entry in &listed {
            let main = &entry.main_payment;
            println!(
                "{}: installment {} {} value {} overdue {} (+{} in arrears)",
                time.now().format("%Y-%m-%d"),
                main.installment_number,
                main.payment_status,
                main.original_value,
                main.overdue_value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string()),
                entry.overdue_payments.len(),
            );
        }
    }

    // pay the first installment late; the overdue value is frozen
    let paid = service.mark_as_paid(&session, first, &time)?;
    println!(
        "\npaid installment {} on {:?}: {} amount {}",
        paid.installment_number,
        paid.payment_date,
        paid.payment_status,
        paid.overdue_value.unwrap_or(paid.original_value),
    );

    // paying again changes nothing
    controller.advance(Duration::days(30));
    let again = service.mark_as_paid(&session, first, &time)?;
    println!("second call returns the same record: {}", again == paid);

    println!("\nevents:");
    for event in service.take_events()? {
        println!("  {:?}", event);
    }

    Ok(())
}
