//! 対話式の都市選択

use crate::error::{ConsoleError, Result};
use dialoguer::Select;
use postdisaster_common::City;

/// IDで都市を探す
pub fn find_city(cities: &[City], id: i64) -> Result<City> {
    cities
        .iter()
        .find(|c| c.id == id)
        .cloned()
        .ok_or(ConsoleError::UnknownCity(id))
}

/// 選択肢の表示文字列
fn city_label(city: &City) -> String {
    format!("{:>3}) {}", city.id, city.name)
}

/// 一覧から都市を1つ選ばせる
pub fn select_city_interactive(cities: &[City]) -> Result<City> {
    if cities.is_empty() {
        return Err(ConsoleError::Prompt("no cities available".into()));
    }

    let labels: Vec<String> = cities.iter().map(city_label).collect();
    let index = Select::new()
        .with_prompt("Select a city to analyze")
        .items(&labels)
        .default(0)
        .interact()
        .map_err(|e| ConsoleError::Prompt(e.to_string()))?;

    println!("→ {}", cities[index].name);
    Ok(cities[index].clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_city() {
        let cities = City::builtin_catalog();
        let city = find_city(&cities, 4).unwrap();
        assert_eq!(city.name, "Ridgeview City");

        let err = find_city(&cities, 99).unwrap_err();
        assert!(matches!(err, ConsoleError::UnknownCity(99)));
    }

    #[test]
    fn test_city_label() {
        let city = City::new(2, "Highland Park City");
        assert_eq!(city_label(&city), "  2) Highland Park City");
    }
}
