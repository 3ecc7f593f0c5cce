/// grouped listing - one row per group with arrears attached, filtered by status
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use installment_billing_rs::views::to_json_pretty;
use installment_billing_rs::{
    BillingService, EngineConfig, InMemoryStore, Money, NewClient, NewPaymentGroup,
    PaymentFilter, PaymentStatus, Rate, SafeTimeProvider, SessionContext, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== grouped listing ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
    ));
    let controller = time.test_control().unwrap();

    let service = BillingService::new(InMemoryStore::new(), EngineConfig::default());
    let session = SessionContext::without_expiry("demo-token");

    let client = service.create_client(
        &session,
        NewClient {
            client_name: "academia movimento".to_string(),
            address: "Rua do Sol, 7".to_string(),
            document: "11.222.333/0001-81".to_string(),
            late_fee_rate: Some(Rate::from_percentage(2)),
            monthly_interest_rate: Some(Rate::from_percentage(1)),
            ..NewClient::default()
        },
        &time,
    )?;

    let payers = [
        ("Paulo Mendes", "529.982.247-25", 10),
        ("Sofia Ramos", "123.456.789-09", 20),
    ];
    for (name, document, day) in payers {
        service.create_payment_group(
            &session,
            NewPaymentGroup::builder()
                .client(client.id)
                .payer(name, document)
                .payer_phone("11999990000")
                .monthly_value(Money::from_minor(12990))
                .installments(4)
                .first_due_date(NaiveDate::from_ymd_opt(2024, 1, day).unwrap())
                .observation("plano trimestral")
                .build()?,
            &time,
        )?;
    }

    // 2024-03-15: Paulo has three installments in arrears, Sofia two
    controller.advance(Duration::days(74));
    println!("today: {}\n", time.now().format("%Y-%m-%d"));

    let all = service.list_payments(&session, &PaymentFilter::for_month(2024, 3), &time)?;
    for entry in &all {
        println!(
            "{} main #{} {} outstanding {}",
            entry.main_payment.group_name,
            entry.main_payment.installment_number,
            entry.main_payment.payment_status,
            entry.total_outstanding(),
        );
    }

    let overdue = service.list_payments(
        &session,
        &PaymentFilter::for_month(2024, 3).status(PaymentStatus::Overdue),
        &time,
    )?;
    println!("\nOVERDUE only:\n{}", to_json_pretty(&overdue)?);

    Ok(())
}
