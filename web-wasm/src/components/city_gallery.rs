//! 都市ギャラリーコンポーネント

use leptos::prelude::*;
use postdisaster_common::City;

#[component]
pub fn CityGallery<FS>(
    cities: Signal<Vec<City>>,
    selected_id: Signal<Option<i64>>,
    disabled: Signal<bool>,
    on_city_select: FS,
) -> impl IntoView
where
    FS: Fn(City) + 'static + Clone + Send + Sync,
{
    view! {
        <div class="city-gallery">
            <div class="gallery-header">
                <h3>"📍 Available Cities"</h3>
                <p class="text-muted">"Select a city to analyze or upload your own satellite image"</p>
            </div>
            <div class="cities-grid">
                <For
                    each=move || cities.get()
                    key=|city| city.id
                    children=move |city| {
                        view! {
                            <CityCard
                                city=city
                                selected_id=selected_id
                                disabled=disabled
                                on_city_select=on_city_select.clone()
                            />
                        }
                    }
                />
            </div>
        </div>
    }
}

#[component]
fn CityCard<FS>(
    city: City,
    selected_id: Signal<Option<i64>>,
    disabled: Signal<bool>,
    on_city_select: FS,
) -> impl IntoView
where
    FS: Fn(City) + 'static + Clone + Send + Sync,
{
    let id = city.id;
    let name = city.name.clone();
    let image = city.image.clone();

    let class = move || {
        let mut classes = vec!["city-card"];
        if selected_id.get() == Some(id) {
            classes.push("selected");
        }
        if disabled.get() {
            classes.push("disabled");
        }
        classes.join(" ")
    };

    let on_click = move |_| {
        if !disabled.get_untracked() {
            on_city_select(city.clone());
        }
    };

    view! {
        <div class=class on:click=on_click>
            <div class="city-image">
                {image.map(|src| view! { <img src=src alt=name.clone() /> })}
            </div>
            <div class="city-info">
                <h4 class="city-name">{name.clone()}</h4>
                <p class="city-id">{format!("City ID: {}", id)}</p>
            </div>
        </div>
    }
}
