/*
Copyright 2021 Jakub Lewandowski

This file is part of Observed Wind Interpolation (wind-interp).

Observed Wind Interpolation (wind-interp) is a free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 3 of the License, or
(at your option) any later version.

Observed Wind Interpolation (wind-interp) is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with Observed Wind Interpolation (wind-interp). If not, see https://www.gnu.org/licenses/.
*/

//! Module containg methods for conducting
//! binary search (bisection) of elements closests
//! to searched values on ascending time axes.

use crate::errors::SearchError;

/// Core bisection function, an implementation of binary search
/// returning the index of the first item not smaller than `x`.
///
/// The array must be sorted ascendingly and `x` must lie
/// within its first and last items.
fn binary_search<T: PartialOrd>(array: &[T], x: &T) -> Result<usize, SearchError> {
    let (first, last) = match (array.first(), array.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(SearchError::EmptyArray),
    };

    if x < first || x > last {
        return Err(SearchError::OutOfBounds);
    }

    let mut lo = 0;
    let mut hi = array.len() - 1;

    while lo < hi {
        let mid = (lo + hi) / 2;

        if array[mid] >= *x {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }

    Ok(lo)
}

/// Finds index of the closest item at or to the left of the searched value.
pub fn find_left_closest<T: PartialOrd>(array: &[T], x: &T) -> Result<usize, SearchError> {
    let found_index = binary_search(array, x)?;

    if array[found_index] <= *x {
        Ok(found_index)
    } else {
        Ok(found_index - 1)
    }
}

/// Finds indices of items bracketing the searched value.
///
/// When the value is equal to one of the items
/// both returned indices point at that item.
pub fn find_bracket<T: PartialOrd>(array: &[T], x: &T) -> Result<(usize, usize), SearchError> {
    let right = binary_search(array, x)?;

    if array[right] <= *x {
        Ok((right, right))
    } else {
        Ok((right - 1, right))
    }
}

#[cfg(test)]
mod tests {
    use super::{find_bracket, find_left_closest};
    use crate::errors::SearchError;

    #[test]
    fn left_closest() {
        let axis = [0, 3600, 7200, 10800];

        assert_eq!(find_left_closest(&axis, &0), Ok(0));
        assert_eq!(find_left_closest(&axis, &1800), Ok(0));
        assert_eq!(find_left_closest(&axis, &3600), Ok(1));
        assert_eq!(find_left_closest(&axis, &10800), Ok(3));
    }

    #[test]
    fn bracket() {
        let axis = [0, 3600, 7200];

        assert_eq!(find_bracket(&axis, &5400), Ok((1, 2)));
        assert_eq!(find_bracket(&axis, &7200), Ok((2, 2)));
        assert_eq!(find_bracket(&axis, &0), Ok((0, 0)));
    }

    #[test]
    fn errors() {
        let empty: [i64; 0] = [];

        assert_eq!(find_bracket(&empty, &0), Err(SearchError::EmptyArray));
        assert_eq!(find_bracket(&[0, 10], &11), Err(SearchError::OutOfBounds));
        assert_eq!(find_left_closest(&[0, 10], &-1), Err(SearchError::OutOfBounds));
    }
}
