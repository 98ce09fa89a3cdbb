//! Geometry shortcuts: rectangle, triangle, circle.

use super::arith::format_number;
use regex::Regex;
use std::sync::OnceLock;

fn num_after(prompt: &str, keys: &[&str]) -> Option<f64> {
    static NUM: OnceLock<Regex> = OnceLock::new();
    let num_re = NUM.get_or_init(|| Regex::new(r"(-?\d+(?:\.\d+)?)").expect("static regex"));
    for key in keys {
        if let Some(pos) = prompt.find(key) {
            if let Some(m) = num_re.find(&prompt[pos + key.len()..]) {
                return m.as_str().parse().ok();
            }
        }
    }
    None
}

fn all_numbers(prompt: &str) -> Vec<f64> {
    static NUM: OnceLock<Regex> = OnceLock::new();
    let num_re = NUM.get_or_init(|| Regex::new(r"(-?\d+(?:\.\d+)?)").expect("static regex"));
    num_re
        .find_iter(prompt)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

pub fn solve_geometry(prompt: &str) -> Option<String> {
    let p = prompt.to_lowercase();
    let wants_area = p.contains("area");
    let wants_perimeter =
        p.contains("perimeter") || p.contains("circumference");
    if !wants_area && !wants_perimeter {
        return None;
    }

    if p.contains("circle") {
        let r = num_after(&p, &["radius"])
            .or_else(|| num_after(&p, &["diameter"]).map(|d| d / 2.0))?;
        if r <= 0.0 {
            return None;
        }
        return Some(if wants_area {
            format!("circle area = {}", format_number(std::f64::consts::PI * r * r))
        } else {
            format!("circle circumference = {}", format_number(2.0 * std::f64::consts::PI * r))
        });
    }

    if p.contains("rectangle") || p.contains("square") {
        let (w, h) = if p.contains("square") {
            let side = num_after(&p, &["side", "of"]).or_else(|| all_numbers(&p).first().copied())?;
            (side, side)
        } else {
            let w = num_after(&p, &["width"]);
            let h = num_after(&p, &["height", "length"]);
            match (w, h) {
                (Some(w), Some(h)) => (w, h),
                _ => {
                    let nums = all_numbers(&p);
                    if nums.len() < 2 {
                        return None;
                    }
                    (nums[0], nums[1])
                }
            }
        };
        if w <= 0.0 || h <= 0.0 {
            return None;
        }
        let shape = if p.contains("square") { "square" } else { "rectangle" };
        return Some(if wants_area {
            format!("{} area = {}", shape, format_number(w * h))
        } else {
            format!("{} perimeter = {}", shape, format_number(2.0 * (w + h)))
        });
    }

    if p.contains("triangle") && wants_area {
        let b = num_after(&p, &["base"])?;
        let h = num_after(&p, &["height"])?;
        if b <= 0.0 || h <= 0.0 {
            return None;
        }
        return Some(format!("triangle area = {}", format_number(b * h / 2.0)));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circle() {
        let area = solve_geometry("area of a circle with radius 2").unwrap();
        assert_eq!(area, "circle area = 12.566371");
        let circ = solve_geometry("circumference of a circle with radius 1").unwrap();
        assert_eq!(circ, "circle circumference = 6.283185");
        // Diameter halves.
        let d = solve_geometry("area of a circle with diameter 4").unwrap();
        assert_eq!(d, "circle area = 12.566371");
    }

    #[test]
    fn test_rectangle() {
        assert_eq!(
            solve_geometry("area of a rectangle with width 3 and height 4"),
            Some("rectangle area = 12".into())
        );
        assert_eq!(
            solve_geometry("perimeter of a rectangle 3 by 4"),
            Some("rectangle perimeter = 14".into())
        );
    }

    #[test]
    fn test_triangle() {
        assert_eq!(
            solve_geometry("area of a triangle with base 6 and height 3"),
            Some("triangle area = 9".into())
        );
    }

    #[test]
    fn test_rejects_incomplete() {
        assert_eq!(solve_geometry("area of a circle"), None);
        assert_eq!(solve_geometry("what is a rectangle"), None);
        assert_eq!(solve_geometry("area of a circle with radius -2"), None);
    }
}
