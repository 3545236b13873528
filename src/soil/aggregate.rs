//! Weighted reduction of surface horizons to one row per county

use rust_decimal::Decimal;

use super::CountyFips;

/// Decimal places kept in the published averages
const AVERAGE_SCALE: u32 = 4;

/// One component's surface horizon
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HorizonRow {
    /// Share of the map unit covered by the component, percent
    pub comppct: Option<Decimal>,
    /// Available water capacity
    pub awc: Option<Decimal>,
    /// Total clay, percent
    pub clay: Option<Decimal>,
    /// pH in 1:1 water
    pub ph: Option<Decimal>,
    /// Organic matter, percent
    pub om: Option<Decimal>,
}

/// Soil properties of one county
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoilAggregate {
    /// County the averages describe
    pub county: CountyFips,
    /// Weighted available water capacity
    pub awc: Option<Decimal>,
    /// Weighted clay percentage
    pub clay: Option<Decimal>,
    /// Weighted pH
    pub ph: Option<Decimal>,
    /// Weighted organic matter percentage
    pub om: Option<Decimal>,
}

#[derive(Default)]
struct WeightedMean {
    weighted_sum: Decimal,
    weight: Decimal,
}

impl WeightedMean {
    /// Readings whose weighted contribution overflows are treated as missing
    fn add(&mut self, value: Option<Decimal>, weight: Decimal) {
        let Some(value) = value else {
            return;
        };
        let sums = value
            .checked_mul(weight)
            .and_then(|product| self.weighted_sum.checked_add(product))
            .zip(self.weight.checked_add(weight));
        if let Some((weighted_sum, total_weight)) = sums {
            self.weighted_sum = weighted_sum;
            self.weight = total_weight;
        }
    }

    fn finish(&self) -> Option<Decimal> {
        if self.weight.is_zero() {
            return None;
        }
        self.weighted_sum
            .checked_div(self.weight)
            .map(|mean| mean.round_dp(AVERAGE_SCALE).normalize())
    }
}

/// Component-percentage weighted averages over `rows`
///
/// Rows without a positive component percentage carry no weight. Each
/// property is averaged over the components that report it. `None` when no
/// row carries weight at all.
pub fn aggregate_county(county: CountyFips, rows: &[HorizonRow]) -> Option<SoilAggregate> {
    let (mut awc, mut clay, mut ph, mut om) = (
        WeightedMean::default(),
        WeightedMean::default(),
        WeightedMean::default(),
        WeightedMean::default(),
    );

    let mut weighted_rows = 0usize;
    for row in rows {
        let weight = match row.comppct {
            Some(pct) if pct > Decimal::ZERO => pct,
            _ => continue,
        };
        weighted_rows += 1;
        awc.add(row.awc, weight);
        clay.add(row.clay, weight);
        ph.add(row.ph, weight);
        om.add(row.om, weight);
    }

    (weighted_rows > 0).then(|| SoilAggregate {
        county,
        awc: awc.finish(),
        clay: clay.finish(),
        ph: ph.finish(),
        om: om.finish(),
    })
}
