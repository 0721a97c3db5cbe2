/// Round to two decimal places, half away from zero. Applied once at the
/// final aggregation step so intermediate sums stay exact.
pub fn round2(val: f64) -> f64 {
    (val * 100.0).round() / 100.0
}

/// Format an amount with thousands separators: ¥1,234.56
pub fn money(val: f64) -> String {
    let negative = val < 0.0;
    let abs = val.abs();
    let cents = format!("{:.2}", abs);
    let parts: Vec<&str> = cents.split('.').collect();
    let int_part = parts[0];
    let dec_part = parts[1];

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    if negative {
        format!("-¥{with_commas}.{dec_part}")
    } else {
        format!("¥{with_commas}.{dec_part}")
    }
}
