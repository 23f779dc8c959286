//! Terminal prompts and response rendering for the menu client.

use std::io::{self, BufRead, Write};
use std::str::FromStr;

use crate::shared_types::{Product, Status};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuChoice {
    AddProduct,
    FindById,
    UpdateQuantity,
    DeleteProduct,
    FindAll,
    Quit,
}

impl MenuChoice {
    pub const ALL: [MenuChoice; 6] = [
        MenuChoice::AddProduct,
        MenuChoice::FindById,
        MenuChoice::UpdateQuantity,
        MenuChoice::DeleteProduct,
        MenuChoice::FindAll,
        MenuChoice::Quit,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MenuChoice::AddProduct => "Add Product",
            MenuChoice::FindById => "Find Product By ID",
            MenuChoice::UpdateQuantity => "Update Product Quantity",
            MenuChoice::DeleteProduct => "Delete Product",
            MenuChoice::FindAll => "Find All Products",
            MenuChoice::Quit => "Quit",
        }
    }
}

const INCORRECT_TYPE: &str = "One or more inputs are of incorrect type. Continue? [Y/n]";

/// Line-oriented prompts over any reader/writer pair.
///
/// Every method returns `Ok(None)` once the user asks to leave or input
/// runs out; callers treat that as a request to quit.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Prompter { input, output }
    }

    pub fn output(&mut self) -> &mut W {
        &mut self.output
    }

    /// Shows `title` and the numbered menu until a valid entry is picked.
    pub fn choose(&mut self, title: &str) -> io::Result<Option<MenuChoice>> {
        loop {
            if !title.is_empty() {
                writeln!(self.output, "{title}\n")?;
            }
            writeln!(self.output, "What would you like to do?")?;
            for (i, choice) in MenuChoice::ALL.iter().enumerate() {
                writeln!(self.output, "  {}) {}", i + 1, choice.label())?;
            }
            write!(self.output, "=> ")?;
            self.output.flush()?;

            let Some(line) = self.read_line()? else {
                return Ok(None);
            };
            let picked = line
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| MenuChoice::ALL.get(i).copied());
            match picked {
                Some(choice) => return Ok(Some(choice)),
                None => writeln!(
                    self.output,
                    "Please pick a number from 1 to {}.",
                    MenuChoice::ALL.len()
                )?,
            }
        }
    }

    /// Asks for a value until it parses as `T`.
    pub fn read<T: FromStr>(&mut self, label: &str) -> io::Result<Option<T>> {
        loop {
            write!(self.output, "Please input the {label}: ")?;
            self.output.flush()?;

            let Some(line) = self.read_line()? else {
                return Ok(None);
            };
            if let Ok(value) = line.parse::<T>() {
                return Ok(Some(value));
            }
            match self.confirm(INCORRECT_TYPE)? {
                Some(true) => continue,
                _ => return Ok(None),
            }
        }
    }

    /// Asks a yes/no question until answered with `y` or `n`.
    pub fn confirm(&mut self, question: &str) -> io::Result<Option<bool>> {
        loop {
            write!(self.output, "{question} ")?;
            self.output.flush()?;

            let Some(line) = self.read_line()? else {
                return Ok(None);
            };
            match line.to_lowercase().as_str() {
                "y" => return Ok(Some(true)),
                "n" => return Ok(Some(false)),
                _ => {}
            }
        }
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

pub fn render_status(status: &Status) -> String {
    format!("Received: {}", status.status)
}

/// Renders a single-record reply, spelling out the sentinels.
pub fn render_product(requested: i64, product: &Product, updated: bool) -> String {
    if product.is_not_found() {
        return format!("Received: Product with ID {requested} does not exist.");
    }
    if product.is_store_unavailable() {
        return "Received: Server failure.".to_string();
    }
    let rendered = product.to_string();
    if updated {
        format!(
            "Received:\n{}",
            rendered.replace("Product Quantity", "Updated Product Quantity")
        )
    } else {
        format!("Received:\n{rendered}")
    }
}

/// Renders a full listing, stopping at the first sentinel.
pub fn render_listing(products: &[Product]) -> String {
    let mut lines = Vec::new();
    for product in products {
        if product.is_not_found() {
            lines.push("There are currently no products in the database.".to_string());
            break;
        }
        if product.is_store_unavailable() {
            lines.push("Received: Server failure. The listing is incomplete.".to_string());
            break;
        }
        lines.push(format!("Received:\n{product}"));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn prompter(input: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn menu_repeats_until_a_valid_pick() {
        let mut p = prompter("9\nabc\n3\n");
        assert_eq!(p.choose("").unwrap(), Some(MenuChoice::UpdateQuantity));

        let shown = String::from_utf8(p.output().clone()).unwrap();
        assert_eq!(shown.matches("What would you like to do?").count(), 3);
    }

    #[test]
    fn bad_number_reprompts_after_confirmation() {
        let mut p = prompter("ten\nmaybe\ny\n10\n");
        assert_eq!(p.read::<i64>("Product Quantity").unwrap(), Some(10));
    }

    #[test]
    fn declining_to_continue_quits() {
        let mut p = prompter("1.5x\nn\n");
        assert_eq!(p.read::<f64>("Product Price").unwrap(), None);
    }

    #[test]
    fn end_of_input_quits() {
        let mut p = prompter("");
        assert_eq!(p.choose("").unwrap(), None);
        assert_eq!(p.read::<i64>("Product ID").unwrap(), None);
    }

    #[test]
    fn sentinels_render_as_explanations() {
        assert_eq!(
            render_product(4, &Product::not_found(), false),
            "Received: Product with ID 4 does not exist."
        );
        assert_eq!(
            render_product(4, &Product::store_unavailable(), false),
            "Received: Server failure."
        );

        let updated = render_product(1, &Product::new(1, "Widget", 3, 2.5), true);
        assert!(updated.contains("Updated Product Quantity: x3"));
        assert!(updated.contains("$2.50"));
    }

    #[test]
    fn listing_stops_at_sentinels() {
        assert_eq!(
            render_listing(&[Product::not_found()]),
            "There are currently no products in the database."
        );

        let partial = render_listing(&[
            Product::new(1, "Widget", 3, 2.5),
            Product::store_unavailable(),
        ]);
        assert!(partial.contains("Product Name: Widget"));
        assert!(partial.ends_with("The listing is incomplete."));
    }
}
