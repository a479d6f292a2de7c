use csv::ReaderBuilder;
use std::error::Error;
use std::fs::File;

/// OHLCV history for one instrument, chronological. The projection engine
/// itself only ever reads a single price series (usually `close`); the full
/// candle set is kept so callers can project calculated fields like `hl2`.
#[derive(Debug, Clone)]
pub struct Candles {
    pub timestamp: Vec<i64>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl Candles {
    pub fn new(
        timestamp: Vec<i64>,
        open: Vec<f64>,
        high: Vec<f64>,
        low: Vec<f64>,
        close: Vec<f64>,
        volume: Vec<f64>,
    ) -> Self {
        Candles {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    pub fn select_candle_field(&self, field: &str) -> Result<&[f64], Box<dyn Error>> {
        match field.to_lowercase().as_str() {
            "open" => Ok(&self.open),
            "high" => Ok(&self.high),
            "low" => Ok(&self.low),
            "close" => Ok(&self.close),
            "volume" => Ok(&self.volume),
            _ => Err(format!("Invalid field: {}", field).into()),
        }
    }

    pub fn get_calculated_field(&self, field: &str) -> Result<Vec<f64>, Box<dyn Error>> {
        match field.to_lowercase().as_str() {
            "hl2" => Ok(self.hl2()),
            "hlc3" => Ok(self.hlc3()),
            "ohlc4" => Ok(self.ohlc4()),
            _ => Err(format!("Invalid calculated field: {}", field).into()),
        }
    }

    pub fn hl2(&self) -> Vec<f64> {
        self.high
            .iter()
            .zip(self.low.iter())
            .map(|(&high, &low)| (high + low) / 2.0)
            .collect()
    }

    pub fn hlc3(&self) -> Vec<f64> {
        self.high
            .iter()
            .zip(self.low.iter())
            .zip(self.close.iter())
            .map(|((&high, &low), &close)| (high + low + close) / 3.0)
            .collect()
    }

    pub fn ohlc4(&self) -> Vec<f64> {
        self.open
            .iter()
            .zip(self.high.iter())
            .zip(self.low.iter())
            .zip(self.close.iter())
            .map(|(((&open, &high), &low), &close)| (open + high + low + close) / 4.0)
            .collect()
    }
}

/// Resolve a source name to a price series slice. Only the stored columns can
/// be borrowed; calculated fields go through `get_calculated_field`.
pub fn source_type<'a>(candles: &'a Candles, source: &str) -> &'a [f64] {
    match source.to_lowercase().as_str() {
        "open" => &candles.open,
        "high" => &candles.high,
        "low" => &candles.low,
        "volume" => &candles.volume,
        _ => &candles.close,
    }
}

/// Column order: timestamp,open,close,high,low,volume (header row expected).
pub fn read_candles_from_csv(file_path: &str) -> Result<Candles, Box<dyn Error>> {
    let file = File::open(file_path)?;
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(file);

    let mut timestamp = Vec::new();
    let mut open = Vec::new();
    let mut high = Vec::new();
    let mut low = Vec::new();
    let mut close = Vec::new();
    let mut volume = Vec::new();

    for result in rdr.records() {
        let record = result?;
        timestamp.push(record[0].parse::<i64>()?);
        open.push(record[1].parse::<f64>()?);
        close.push(record[2].parse::<f64>()?);
        high.push(record[3].parse::<f64>()?);
        low.push(record[4].parse::<f64>()?);
        volume.push(record[5].parse::<f64>()?);
    }

    Ok(Candles::new(timestamp, open, high, low, close, volume))
}
