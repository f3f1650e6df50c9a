use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

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

    fn below(&mut self, n: u64) -> u64 {
        self.next_u64() % n
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[self.below(items.len() as u64) as usize]
    }
}

const REGIONS: [&str; 4] = ["North", "South", "East", "West"];
const FIRST_NAMES: [&str; 8] = ["Ann", "Bob", "Cleo", "Dev", "Eli", "Fay", "Gus", "Hana"];
const PRODUCTS: [&str; 5] = ["audit", "tax", "advisory", "payroll", "legal"];

/// `customers.csv`: one row per customer, joinable on `customer_id`.
fn write_customers(dir: &Path, count: u64, rng: &mut SimpleRng) -> Result<PathBuf> {
    let path = dir.join("customers.csv");
    let mut writer = csv::Writer::from_path(&path).context("creating customers.csv")?;
    writer.write_record(["customer_id", "name", "region", "signup_date", "credit_limit"])?;
    for id in 1..=count {
        let name = format!("{} {}", rng.pick(&FIRST_NAMES), id);
        let signup = format!("2023-{:02}-{:02}", rng.below(12) + 1, rng.below(28) + 1);
        let limit = format!("{:.2}", 1000.0 + rng.next_f64() * 9000.0);
        writer.write_record([
            id.to_string(),
            name,
            rng.pick(&REGIONS).to_string(),
            signup,
            limit,
        ])?;
    }
    writer.flush().context("writing customers.csv")?;
    Ok(path)
}

/// `orders.sql`: a script that builds `your_table`, the table the app reads back.
fn write_orders(dir: &Path, count: u64, customers: u64, rng: &mut SimpleRng) -> Result<PathBuf> {
    let mut script = String::from(
        "CREATE TABLE your_table (\n  order_id INTEGER PRIMARY KEY,\n  customer_id INTEGER,\n  \
         product TEXT,\n  amount REAL,\n  placed_at TEXT\n);\n",
    );
    for id in 1..=count {
        // Some orders reference customers that do not exist, so the join drops them.
        let customer = rng.below(customers + 5) + 1;
        writeln!(
            script,
            "INSERT INTO your_table VALUES ({id}, {customer}, '{}', {:.2}, '2024-{:02}-{:02} {:02}:{:02}:00');",
            rng.pick(&PRODUCTS),
            50.0 + rng.next_f64() * 950.0,
            rng.below(12) + 1,
            rng.below(28) + 1,
            rng.below(24),
            rng.below(60),
        )?;
    }
    let path = dir.join("orders.sql");
    std::fs::write(&path, script).context("writing orders.sql")?;
    Ok(path)
}

fn main() -> Result<()> {
    let dir = PathBuf::from(
        std::env::args()
            .nth(1)
            .unwrap_or_else(|| "sample_data".to_string()),
    );
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating {}", dir.display()))?;

    let mut rng = SimpleRng::new(42);
    let customers = 40;
    let orders = 200;

    let customers_path = write_customers(&dir, customers, &mut rng)?;
    let orders_path = write_orders(&dir, orders, customers, &mut rng)?;

    println!(
        "Wrote {customers} customers to {} and {orders} orders to {}",
        customers_path.display(),
        orders_path.display()
    );
    println!("Join them on customer_id / customer_id in the Multiple File Layout page.");
    Ok(())
}
