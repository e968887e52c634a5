use std::collections::{BTreeMap, BTreeSet};

/// A comparison-set value that may or may not hold a usable price.
pub trait AsPrice {
    /// `None` unless the value is a finite number.
    fn as_price(&self) -> Option<f64>;
}

impl AsPrice for f64 {
    fn as_price(&self) -> Option<f64> {
        self.is_finite().then_some(*self)
    }
}

impl<T: AsPrice> AsPrice for Option<T> {
    fn as_price(&self) -> Option<f64> {
        self.as_ref().and_then(AsPrice::as_price)
    }
}

impl AsPrice for str {
    fn as_price(&self) -> Option<f64> {
        self.trim().parse::<f64>().ok().and_then(|v| v.as_price())
    }
}

impl AsPrice for String {
    fn as_price(&self) -> Option<f64> {
        self.as_str().as_price()
    }
}

impl AsPrice for serde_json::Value {
    fn as_price(&self) -> Option<f64> {
        match self {
            serde_json::Value::Number(n) => n.as_f64().and_then(|v| v.as_price()),
            serde_json::Value::String(s) => s.as_price(),
            _ => None,
        }
    }
}

/// Labels whose price is strictly greater than `baseline`.
///
/// Entries without a finite price are left out rather than failing the whole
/// comparison; upstream fetches for individual members fail routinely.
pub fn stocks_above<'a, K, V, I>(prices: I, baseline: f64) -> BTreeSet<K>
where
    K: Ord + Clone + 'a,
    V: AsPrice + ?Sized + 'a,
    I: IntoIterator<Item = (&'a K, &'a V)>,
{
    prices
        .into_iter()
        .filter_map(|(label, value)| {
            let price = value.as_price()?;
            (price > baseline).then(|| label.clone())
        })
        .collect()
}

/// Convenience for the label -> latest-close maps the dashboard builds.
pub fn stocks_above_map<V: AsPrice>(prices: &BTreeMap<String, V>, baseline: f64) -> BTreeSet<String> {
    stocks_above(prices.iter(), baseline)
}
