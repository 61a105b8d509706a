//! Shipping package estimation.

use serde::{Deserialize, Serialize};

use crate::product::Product;

/// Minimum billable package weight.
pub const MIN_PACKAGE_WEIGHT_LB: f64 = 0.5;

/// An estimated shipping package for an order.
///
/// Weight is the sum of product weight × quantity over the linked
/// items, floored at [`MIN_PACKAGE_WEIGHT_LB`]. Dimensions are the
/// per-axis maximum across items rather than a bin-packing result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PackageSpec {
    pub weight_lb: f64,
    pub length_in: f64,
    pub width_in: f64,
    pub height_in: f64,
}

impl PackageSpec {
    /// Estimates the package for a set of (product, quantity) pairs.
    pub fn estimate<'a>(items: impl IntoIterator<Item = (&'a Product, u32)>) -> PackageSpec {
        let mut weight = 0.0;
        let mut length: f64 = 0.0;
        let mut width: f64 = 0.0;
        let mut height: f64 = 0.0;

        for (product, quantity) in items {
            weight += product.weight_lb * f64::from(quantity);
            length = length.max(product.dimensions.length_in);
            width = width.max(product.dimensions.width_in);
            height = height.max(product.dimensions.height_in);
        }

        PackageSpec {
            weight_lb: weight.max(MIN_PACKAGE_WEIGHT_LB),
            length_in: length,
            width_in: width,
            height_in: height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::Dimensions;
    use common::{ProductId, Sku};

    fn product(weight_lb: f64, l: f64, w: f64, h: f64) -> Product {
        Product {
            id: ProductId::new(),
            sku: Sku::new("SKU"),
            name: "p".to_string(),
            dimensions: Dimensions {
                length_in: l,
                width_in: w,
                height_in: h,
            },
            weight_lb,
            stock: 0,
            low_stock_threshold: 0,
            platform_product_id: None,
            platform_variant_id: None,
        }
    }

    #[test]
    fn weight_is_sum_times_quantity() {
        let a = product(1.5, 10.0, 6.0, 4.0);
        let b = product(0.25, 4.0, 4.0, 12.0);
        let spec = PackageSpec::estimate([(&a, 2), (&b, 4)]);
        assert!((spec.weight_lb - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn dimensions_are_per_axis_max() {
        let a = product(1.0, 10.0, 6.0, 4.0);
        let b = product(1.0, 4.0, 8.0, 12.0);
        let spec = PackageSpec::estimate([(&a, 1), (&b, 1)]);
        assert_eq!(spec.length_in, 10.0);
        assert_eq!(spec.width_in, 8.0);
        assert_eq!(spec.height_in, 12.0);
    }

    #[test]
    fn weight_floored_at_half_pound() {
        let feather = product(0.01, 1.0, 1.0, 1.0);
        let spec = PackageSpec::estimate([(&feather, 1)]);
        assert_eq!(spec.weight_lb, MIN_PACKAGE_WEIGHT_LB);

        let spec = PackageSpec::estimate([]);
        assert_eq!(spec.weight_lb, MIN_PACKAGE_WEIGHT_LB);
    }
}
