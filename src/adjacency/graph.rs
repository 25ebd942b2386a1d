//! CSR adjacency graph between a *domain* set and an *image* set.
//
// `domain_ptr[i] .. domain_ptr[i+1]` indexes the images of domain node `i`
// inside `image_idx`. The same layout doubles as a sparsity pattern
// (rows = domain, columns = image) and as a rank→element assignment.

use itertools::Itertools;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    num_image: usize,
    domain_ptr: Vec<usize>,
    image_idx: Vec<usize>,
}

impl Graph {
    /// Build from raw CSR arrays.
    ///
    /// Panics if the arrays are inconsistent (programming error).
    pub fn new(num_image: usize, domain_ptr: Vec<usize>, image_idx: Vec<usize>) -> Self {
        assert!(!domain_ptr.is_empty(), "domain_ptr needs a leading 0");
        assert_eq!(domain_ptr[0], 0);
        assert!(domain_ptr.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*domain_ptr.last().unwrap_or(&0), image_idx.len());
        assert!(
            image_idx.iter().all(|&j| j < num_image),
            "image index out of range 0..{num_image}"
        );
        Self {
            num_image,
            domain_ptr,
            image_idx,
        }
    }

    /// Empty graph with `num_domain` nodes and no adjacencies.
    pub fn empty(num_domain: usize, num_image: usize) -> Self {
        Self::new(num_image, vec![0; num_domain + 1], Vec::new())
    }

    /// Build from per-domain adjacency lists (kept in the given order).
    pub fn from_lists<I, L>(num_image: usize, lists: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: IntoIterator<Item = usize>,
    {
        let mut domain_ptr = vec![0];
        let mut image_idx = Vec::new();
        for l in lists {
            image_idx.extend(l);
            domain_ptr.push(image_idx.len());
        }
        Self::new(num_image, domain_ptr, image_idx)
    }

    #[inline]
    pub fn num_domain(&self) -> usize {
        self.domain_ptr.len() - 1
    }

    #[inline]
    pub fn num_image(&self) -> usize {
        self.num_image
    }

    #[inline]
    pub fn num_indices(&self) -> usize {
        self.image_idx.len()
    }

    #[inline]
    pub fn image(&self, i: usize) -> &[usize] {
        &self.image_idx[self.domain_ptr[i]..self.domain_ptr[i + 1]]
    }

    pub fn domain_ptr(&self) -> &[usize] {
        &self.domain_ptr
    }

    pub fn image_idx(&self) -> &[usize] {
        &self.image_idx
    }

    /// Image → domain graph; images of each node come out sorted.
    pub fn transpose(&self) -> Graph {
        let mut count = vec![0usize; self.num_image + 1];
        for &j in &self.image_idx {
            count[j + 1] += 1;
        }
        for j in 0..self.num_image {
            count[j + 1] += count[j];
        }
        let mut fill = count.clone();
        let mut idx = vec![0usize; self.image_idx.len()];
        for i in 0..self.num_domain() {
            for &j in self.image(i) {
                idx[fill[j]] = i;
                fill[j] += 1;
            }
        }
        Graph {
            num_image: self.num_domain(),
            domain_ptr: count,
            image_idx: idx,
        }
    }

    /// `a: X → Y` composed with `b: Y → Z`, each image listed once
    /// (in first-reached order).
    pub fn compose_injectify(a: &Graph, b: &Graph) -> Graph {
        assert_eq!(
            a.num_image,
            b.num_domain(),
            "composition needs matching middle sets"
        );
        let mut mark = vec![usize::MAX; b.num_image];
        let mut lists = Vec::with_capacity(a.num_domain());
        for i in 0..a.num_domain() {
            let mut row = Vec::new();
            for &y in a.image(i) {
                for &z in b.image(y) {
                    if mark[z] != i {
                        mark[z] = i;
                        row.push(z);
                    }
                }
            }
            lists.push(row);
        }
        Graph::from_lists(b.num_image, lists)
    }

    /// Sort the images of every domain node ascending.
    pub fn sort_indices(&mut self) {
        for i in 0..self.num_domain() {
            let (lo, hi) = (self.domain_ptr[i], self.domain_ptr[i + 1]);
            self.image_idx[lo..hi].sort_unstable();
        }
    }

    /// Degree of every domain node.
    pub fn degrees(&self) -> Vec<usize> {
        self.domain_ptr
            .iter()
            .tuple_windows()
            .map(|(a, b)| b - a)
            .collect()
    }
}
