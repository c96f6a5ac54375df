//! Sample data for the built-in resources.
//!
//! Seeding only touches tables that are empty, so restarting the service never duplicates rows
//! or overwrites changes made through the API. Rows go through the same validator as API
//! payloads; a row that no longer fits a customised schema is skipped with a warning.

use crate::db::errors::DbError;
use crate::db::handlers::{Records, Repository};
use crate::db::models::records::Entity;
use crate::schema::ResourceSchema;
use crate::validation::validate;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tracing::{debug, info, instrument, warn};

/// Sample rows for a built-in resource, as API-style JSON payloads.
pub fn sample_rows(resource: &str) -> Option<Vec<Value>> {
    let rows = match resource {
        "recipes" => vec![
            json!({"name": "Avocado Toast", "link": "https://californiaavocado.com/recipes", "type": "Breakfast", "calories": 100}),
            json!({"name": "Scrambled Eggs", "link": "https://californiaavocado.com/recipes", "type": "Breakfast", "calories": 100}),
            json!({"name": "Pancake", "link": "https://californiaavocado.com/recipes", "type": "Breakfast", "calories": 100}),
            json!({"name": "Mac and Cheese", "link": "https://californiaavocado.com/recipes", "type": "Lunch", "calories": 2000}),
            json!({"name": "Panini Sandwich", "link": "https://californiaavocado.com/recipes", "type": "Lunch", "calories": 2000}),
            json!({"name": "Salad", "link": "https://californiaavocado.com/recipes", "type": "Lunch", "calories": 2000}),
            json!({"name": "Minestrone Soup", "link": "https://californiaavocado.com/recipes", "type": "Dinner", "calories": 3000}),
            json!({"name": "Lasagna", "link": "https://californiaavocado.com/recipes", "type": "Dinner", "calories": 3000}),
            json!({"name": "Pasta", "link": "https://californiaavocado.com/recipes", "type": "Dinner", "calories": 3000}),
            json!({"name": "Brownies", "link": "https://californiaavocado.com/recipes", "type": "Dessert", "calories": 400}),
            json!({"name": "Chocolate Chip Cookies", "link": "https://californiaavocado.com/recipes", "type": "Dessert", "calories": 400}),
            json!({"name": "Custard Pudding", "link": "https://californiaavocado.com/recipes", "type": "Dessert", "calories": 400}),
        ],
        "fridges" => [
            ("Baked Feta Pasta", "https://www.foodnetwork.com/recipes/food-network-kitchen/baked-feta-pasta-9867689"),
            ("Kale Salad", "https://www.loveandlemons.com/kale-salad/"),
            ("Turkey Burgers", "https://www.kimscravings.com/easy-turkey-burgers/"),
            ("Lentil Soup", "https://www.recipetineats.com/lentil-soup/"),
            ("Caramelized Onion Mushroom Pizza", "https://showmetheyummy.com/caramelized-onion-mushroom-pizza-recipe/"),
            ("Banana Bread", "https://www.simplyrecipes.com/recipes/banana_bread/"),
            ("Chicken Fajitas", "https://healthyrecipesblogs.com/easy-chicken-fajitas/"),
            ("Quick Tacos", "https://www.acouplecooks.com/quick-dinner-idea-5-minute-tacos/"),
            ("Garlic Butter Shrimp", "https://www.acouplecooks.com/garlic-butter-shrimp/"),
            ("Mediterranean Tuna Salad", "https://www.acouplecooks.com/mediterranean-tuna-salad/"),
        ]
        .into_iter()
        .map(|(name, link)| json!({"name": name, "link": link}))
        .collect(),
        "nutritions" => [
            ("Apple", "94 cal", "0.31g", "20.77 g"),
            ("Flour", "455.00 kcal", " 1.23 g", "92.01 g"),
            ("Orange", " 61.57 kcal", "0.16 g", "12.25 g"),
            ("Milk", "148.84 kcal", "7.93 g", " 11.71 g"),
            ("Egg", "61.49 kcal", "4.09 g", " 0.31 g"),
        ]
        .into_iter()
        .map(|(name, calories, fat, carbs)| json!({"name": name, "calories": calories, "fat": fat, "carbs": carbs}))
        .collect(),
        "scores" => [("Shruthi", "2"), ("Lina", "3"), ("Lydia", "1"), ("Sarah", "5"), ("Jake", "6")]
            .into_iter()
            .map(|(name, score)| json!({"name": name, "score": score}))
            .collect(),
        _ => return None,
    };
    Some(rows)
}

/// Seeds every resource that has sample rows and an empty table.
#[instrument(skip_all, err)]
pub async fn seed_sample_data(pool: &SqlitePool, resources: &[ResourceSchema]) -> anyhow::Result<()> {
    for schema in resources {
        let Some(rows) = sample_rows(&schema.name) else {
            continue;
        };

        // One transaction per resource: either all of its valid rows land or none do
        let mut tx = pool.begin().await?;
        let mut repo = Records::new(&mut tx, schema);

        if repo.count().await? > 0 {
            debug!(resource = %schema.name, "Table already has data, skipping sample rows");
            continue;
        }

        let mut inserted = 0;
        for row in rows {
            let Some(payload) = row.as_object() else {
                continue;
            };
            let fields = match validate(payload, &schema.fields) {
                Ok(fields) => fields,
                Err(e) => {
                    warn!(resource = %schema.name, "Skipping sample row: {e}");
                    continue;
                }
            };
            match repo.create(&Entity::new(fields)).await {
                Ok(_) => inserted += 1,
                Err(e @ DbError::UniqueViolation { .. }) => {
                    warn!(resource = %schema.name, "Skipping sample row: {e}");
                }
                Err(e) => return Err(e.into()),
            }
        }

        tx.commit().await?;
        info!(resource = %schema.name, inserted, "Seeded sample data");
    }

    Ok(())
}
