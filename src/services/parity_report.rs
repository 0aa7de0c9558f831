//! Currency parity report (spec §4.11): per-currency base/rate/deviation
//! snapshot, for eyeballing drift against the configured base currency.

use rust_decimal::Decimal;

use crate::domain::currency::CurrencyCode;
use crate::uow::UnitOfWork;

#[derive(Debug, Clone, PartialEq)]
pub struct ParityLine {
    pub code: CurrencyCode,
    pub is_base: bool,
    pub latest_rate: Option<Decimal>,
    pub deviation: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParityReport {
    pub lines: Vec<ParityLine>,
    pub has_deviation: bool,
}

pub async fn parity(
    uow: &mut dyn UnitOfWork,
    base_only: bool,
    codes: Option<&[CurrencyCode]>,
    include_dev: bool,
) -> Result<ParityReport, crate::repos::RepoError> {
    let mut currencies = uow.currencies().list().await?;
    currencies.sort_by(|a, b| a.code.as_str().cmp(b.code.as_str()));

    if base_only {
        currencies.retain(|c| c.is_base);
    }
    if let Some(codes) = codes {
        currencies.retain(|c| codes.contains(&c.code));
    }

    let has_base = currencies.iter().any(|c| c.is_base);

    let lines: Vec<ParityLine> = currencies
        .into_iter()
        .map(|c| {
            let deviation = if include_dev && !c.is_base && has_base {
                c.exchange_rate.map(|r| (r - Decimal::ONE) * Decimal::from(100))
            } else {
                None
            };
            ParityLine {
                code: c.code,
                is_base: c.is_base,
                latest_rate: if c.is_base { None } else { c.exchange_rate },
                deviation,
            }
        })
        .collect();

    let has_deviation = lines.iter().any(|l| l.deviation.is_some());

    Ok(ParityReport { lines, has_deviation })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::currency::Currency;
    use crate::repos::memory::SharedStore;
    use crate::repos::CurrencyRepo;
    use crate::uow::InMemoryUnitOfWork;
    use rust_decimal_macros::dec;

    async fn seeded() -> InMemoryUnitOfWork {
        let store = SharedStore::new();
        let mut uow = InMemoryUnitOfWork::new(store);
        uow.store.upsert(&Currency::new_base(CurrencyCode::parse("USD").unwrap())).await.unwrap();
        uow.store.upsert(&Currency::new_non_base(CurrencyCode::parse("EUR").unwrap(), dec!(1.10))).await.unwrap();
        uow.store.upsert(&Currency::new_non_base(CurrencyCode::parse("GBP").unwrap(), dec!(0.90))).await.unwrap();
        uow
    }

    #[tokio::test]
    async fn reports_are_sorted_and_flag_deviation() {
        let mut uow = seeded().await;
        let report = parity(&mut uow, false, None, true).await.unwrap();
        let codes: Vec<&str> = report.lines.iter().map(|l| l.code.as_str()).collect();
        assert_eq!(codes, vec!["EUR", "GBP", "USD"]);
        assert!(report.has_deviation);

        let usd = report.lines.iter().find(|l| l.code.as_str() == "USD").unwrap();
        assert_eq!(usd.latest_rate, None);
        assert_eq!(usd.deviation, None);

        let eur = report.lines.iter().find(|l| l.code.as_str() == "EUR").unwrap();
        assert_eq!(eur.latest_rate, Some(dec!(1.10)));
        assert_eq!(eur.deviation, Some(dec!(10.00)));
    }

    #[tokio::test]
    async fn base_only_filters_to_the_base_currency() {
        let mut uow = seeded().await;
        let report = parity(&mut uow, true, None, true).await.unwrap();
        assert_eq!(report.lines.len(), 1);
        assert_eq!(report.lines[0].code.as_str(), "USD");
        assert!(!report.has_deviation);
    }

    #[tokio::test]
    async fn include_dev_false_suppresses_deviation() {
        let mut uow = seeded().await;
        let report = parity(&mut uow, false, None, false).await.unwrap();
        assert!(!report.has_deviation);
        assert!(report.lines.iter().all(|l| l.deviation.is_none()));
    }
}
