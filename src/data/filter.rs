use super::container::Container;
use super::model::ClassLabel;
use super::resource::Resource;
use crate::error::Result;

// ---------------------------------------------------------------------------
// Class lookups: where the first record of a class sits
// ---------------------------------------------------------------------------

/// Flat index of the first record of class `label` in `container`.
pub fn first_of_class(container: &Container, label: ClassLabel) -> Result<Option<usize>> {
    let mut offset = 0;
    for resource in container {
        for i in 0..resource.len() {
            if resource.class_of(i)? == label {
                return Ok(Some(offset + i));
            }
        }
        offset += resource.len();
    }
    Ok(None)
}

/// Position of the first record of class `label` in `resource`.
pub fn first_in_resource(resource: &Resource, label: ClassLabel) -> Result<Option<usize>> {
    for i in 0..resource.len() {
        if resource.class_of(i)? == label {
            return Ok(Some(i));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labelled(classes: &[usize]) -> Resource {
        let attrs: Vec<Vec<f64>> = (0..classes.len()).map(|i| vec![i as f64]).collect();
        let targets: Vec<Vec<f64>> = classes
            .iter()
            .map(|&c| {
                let mut row = vec![0.0; 3];
                row[c] = 1.0;
                row
            })
            .collect();
        Resource::from_rows(&attrs, &targets).unwrap()
    }

    #[test]
    fn first_of_class_uses_flat_index() {
        let mut c = Container::new();
        c.insert(labelled(&[0, 0])).insert(labelled(&[1, 2]));
        assert_eq!(first_of_class(&c, ClassLabel::new(2.0)).unwrap(), Some(3));
        assert_eq!(first_of_class(&c, ClassLabel::new(0.0)).unwrap(), Some(0));
        assert_eq!(first_of_class(&c, ClassLabel::new(5.0)).unwrap(), None);
    }

    #[test]
    fn first_in_resource_finds_match() {
        let r = labelled(&[1, 1, 0]);
        assert_eq!(first_in_resource(&r, ClassLabel::new(0.0)).unwrap(), Some(2));
        assert_eq!(first_in_resource(&r, ClassLabel::new(2.0)).unwrap(), None);
    }
}
