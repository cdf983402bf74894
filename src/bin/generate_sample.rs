//! Writes a synthetic, semicolon-delimited bank telemarketing dataset.
//!
//! Usage: `generate_sample [OUTPUT] [ROWS]`

use anyhow::{Context, Result};

const JOBS: [&str; 11] = [
    "admin.",
    "blue-collar",
    "technician",
    "services",
    "management",
    "retired",
    "entrepreneur",
    "self-employed",
    "housemaid",
    "unemployed",
    "student",
];
const MARITAL: [&str; 3] = ["married", "single", "divorced"];
const YES_NO: [&str; 3] = ["no", "yes", "unknown"];
const CONTACT: [&str; 2] = ["cellular", "telephone"];
const MONTHS: [&str; 10] = ["mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec"];
const DAYS: [&str; 5] = ["mon", "tue", "wed", "thu", "fri"];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    /// Index drawn from `weights` (need not sum to 1).
    fn weighted(&mut self, weights: &[f64]) -> usize {
        let total: f64 = weights.iter().sum();
        let mut target = self.next_f64() * total;
        for (i, w) in weights.iter().enumerate() {
            if target < *w {
                return i;
            }
            target -= w;
        }
        weights.len() - 1
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        let weights = vec![1.0; items.len()];
        items[self.weighted(&weights)]
    }
}

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let output_path = args.next().unwrap_or_else(|| "bank_sample.csv".to_string());
    let rows: usize = match args.next() {
        Some(n) => n.parse().with_context(|| format!("invalid row count {n:?}"))?,
        None => 2000,
    };

    let mut rng = SimpleRng::new(42);
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_path(&output_path)
        .with_context(|| format!("creating {output_path}"))?;

    writer.write_record([
        "age",
        "job",
        "marital",
        "default",
        "housing",
        "loan",
        "contact",
        "month",
        "day_of_week",
        "duration",
        "campaign",
        "y",
    ])?;

    let mut subscribed = 0usize;
    for _ in 0..rows {
        let age = rng.gauss(40.0, 10.0).round().clamp(17.0, 98.0) as i64;
        let job = if age >= 60 && rng.next_f64() < 0.6 {
            "retired"
        } else if age <= 24 && rng.next_f64() < 0.4 {
            "student"
        } else {
            rng.pick(&JOBS)
        };
        let marital = MARITAL[rng.weighted(&[0.6, 0.28, 0.12])];
        let default = YES_NO[rng.weighted(&[0.79, 0.001, 0.209])];
        let housing = YES_NO[rng.weighted(&[0.45, 0.53, 0.02])];
        let loan = YES_NO[rng.weighted(&[0.82, 0.16, 0.02])];
        let contact = CONTACT[rng.weighted(&[0.63, 0.37])];
        let month = MONTHS[rng.weighted(&[0.01, 0.06, 0.33, 0.13, 0.17, 0.15, 0.01, 0.02, 0.1, 0.02])];
        let day = rng.pick(&DAYS);
        let duration = rng.gauss(250.0, 180.0).abs().round() as i64;
        let campaign = 1 + (rng.next_f64() * rng.next_f64() * 10.0) as i64;

        // Longer calls, cellular contact and older or younger clients subscribe more often.
        let mut p = 0.02 + (duration as f64 / 1500.0).min(0.5);
        if contact == "cellular" {
            p += 0.04;
        }
        if !(25..60).contains(&age) {
            p += 0.08;
        }
        let y = if rng.next_f64() < p { "yes" } else { "no" };
        if y == "yes" {
            subscribed += 1;
        }

        writer.write_record([
            age.to_string(),
            job.to_string(),
            marital.to_string(),
            default.to_string(),
            housing.to_string(),
            loan.to_string(),
            contact.to_string(),
            month.to_string(),
            day.to_string(),
            duration.to_string(),
            campaign.to_string(),
            y.to_string(),
        ])?;
    }
    writer.flush().context("flushing output")?;

    println!("Wrote {rows} clients ({subscribed} subscribed) to {output_path}");
    Ok(())
}
