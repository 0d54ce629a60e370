use cityweather_core::{Category, Phase, ViewModel};

/// Glyph shown next to the temperature for each category.
pub fn glyph(category: Category) -> &'static str {
    match category {
        Category::Clear => "☀️",
        Category::Cloudy => "☁️",
        Category::Rainy => "🌧️",
        Category::Snowy => "❄️",
        Category::Stormy => "⛈️",
    }
}

/// `1234567` -> `1,234,567`
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn render_json(vm: &ViewModel) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(vm)?)
}

/// Human-readable rendering of a view-model snapshot.
pub fn render_text(vm: &ViewModel) -> String {
    match vm.phase {
        Phase::Idle => String::new(),
        Phase::Loading => format!("Loading {}...", vm.city_name),
        Phase::Error => vm.error_message.clone().unwrap_or_default(),
        Phase::Success => render_card(vm),
    }
}

fn render_card(vm: &ViewModel) -> String {
    let (Some(weather), Some(city)) = (&vm.weather, &vm.city_info) else {
        return String::new();
    };

    let icon = vm.category.map(glyph).unwrap_or_default();
    let updated = weather
        .observed_at_parsed()
        .map(|t| t.format("%a %d %b %Y, %H:%M").to_string())
        .unwrap_or_else(|| weather.observed_at.clone());

    let place = if city.admin_region.is_empty() {
        city.name.clone()
    } else {
        format!("{}, {}", city.name, city.admin_region)
    };

    format!(
        "📍 {place}\n\
         {country}\n\
         \n\
         {icon} {temp}°C\n\
         Wind: {wind} km/h\n\
         Code: {code}\n\
         \n\
         Population: {population}\n\
         Elevation:  {elevation} m\n\
         Lat: {lat}  Long: {lon}\n\
         Updated: {updated}",
        country = city.country,
        temp = weather.temperature_c,
        wind = weather.wind_speed_kmh,
        code = weather.weather_code,
        population = group_thousands(city.population),
        elevation = city.elevation_m,
        lat = city.latitude,
        lon = city.longitude,
    )
}
